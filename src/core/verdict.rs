use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-test-case verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "AC")]
    Accepted,
    #[serde(rename = "WA")]
    WrongAnswer,
    #[serde(rename = "RE")]
    RuntimeError,
    #[serde(rename = "TLE")]
    TimeLimitExceeded,
    #[serde(rename = "MLE")]
    MemoryLimitExceeded,
    #[serde(rename = "CE")]
    CompileError,
    /// Infrastructure fault, never a statement about the submitted code
    #[serde(rename = "UNK")]
    Unknown,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Accepted => "AC",
            Verdict::WrongAnswer => "WA",
            Verdict::RuntimeError => "RE",
            Verdict::TimeLimitExceeded => "TLE",
            Verdict::MemoryLimitExceeded => "MLE",
            Verdict::CompileError => "CE",
            Verdict::Unknown => "UNK",
        };
        write!(f, "{}", s)
    }
}

/// Aggregation category with the fixed precedence used to fold test verdicts.
///
/// Declaration order is the precedence: a later variant is worse. The final
/// category of a submission is the maximum over its test case verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCategory {
    #[serde(rename = "AC")]
    Accepted,
    #[serde(rename = "WA")]
    WrongAnswer,
    #[serde(rename = "RE")]
    RuntimeError,
    #[serde(rename = "TLE")]
    TimeLimitExceeded,
    #[serde(rename = "MLE")]
    MemoryLimitExceeded,
    #[serde(rename = "CE")]
    CompileError,
    Judging,
    Compiling,
    Pending,
    #[serde(rename = "UNK")]
    Unknown,
}

impl From<Verdict> for StatusCategory {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Accepted => StatusCategory::Accepted,
            Verdict::WrongAnswer => StatusCategory::WrongAnswer,
            Verdict::RuntimeError => StatusCategory::RuntimeError,
            Verdict::TimeLimitExceeded => StatusCategory::TimeLimitExceeded,
            Verdict::MemoryLimitExceeded => StatusCategory::MemoryLimitExceeded,
            Verdict::CompileError => StatusCategory::CompileError,
            Verdict::Unknown => StatusCategory::Unknown,
        }
    }
}

impl StatusCategory {
    /// Worst category across a set of verdicts; an empty set is `Accepted`.
    pub fn worst_of<I>(verdicts: I) -> Self
    where
        I: IntoIterator<Item = Verdict>,
    {
        verdicts
            .into_iter()
            .map(StatusCategory::from)
            .max()
            .unwrap_or(StatusCategory::Accepted)
    }

    /// Whether judging ran to completion and produced a judgment
    pub fn is_judgment(self) -> bool {
        matches!(self, StatusCategory::Accepted | StatusCategory::WrongAnswer)
    }
}

/// Lifecycle of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SubmissionStatus {
    #[default]
    Pending,
    Compiling,
    Judging,
    Success,
    Error,
}

impl SubmissionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SubmissionStatus::Success | SubmissionStatus::Error)
    }
}

impl From<StatusCategory> for SubmissionStatus {
    fn from(category: StatusCategory) -> Self {
        if category.is_judgment() {
            SubmissionStatus::Success
        } else {
            SubmissionStatus::Error
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Compiling => "compiling",
            SubmissionStatus::Judging => "judging",
            SubmissionStatus::Success => "success",
            SubmissionStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}
