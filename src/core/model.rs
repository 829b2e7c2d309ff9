//! Persisted records the judging core reads and writes

use serde::{Deserialize, Serialize};

use crate::core::verdict::{StatusCategory, SubmissionStatus, Verdict};
use crate::plagiarism::pdg::Pdg;
use crate::plagiarism::report::SimilarityReport;

/// Output comparison strategy of a problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JudgeMode {
    /// Compare with trailing whitespace stripped
    #[default]
    Standard,
    /// Byte-exact comparison
    Strict,
    /// Problem-specific special judge decides
    Spj,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub id: i64,
    /// Overrides the language default when set
    #[serde(default)]
    pub time_limit_ms: Option<u32>,
    /// Overrides the language default when set
    #[serde(default)]
    pub memory_limit_mb: Option<u32>,
    pub testcases: Vec<TestCase>,
    #[serde(default)]
    pub judge_mode: JudgeMode,
    #[serde(default)]
    pub spj_code: Option<String>,
    #[serde(default)]
    pub spj_language_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Language {
    pub id: i64,
    pub name: String,
    /// Source file extension including the dot (e.g. ".py")
    pub file_ext: String,
    #[serde(default)]
    pub compile_command: Option<String>,
    /// File the compile step must leave in the working directory
    #[serde(default)]
    pub compile_artifact: Option<String>,
    pub run_command: String,
    /// Container image the language runs in
    pub image: String,
    pub time_limit_ms: u32,
    pub memory_limit_mb: u32,
}

impl Language {
    pub fn source_file(&self) -> String {
        format!("main{}", self.file_ext)
    }

    pub fn is_python(&self) -> bool {
        self.name.to_lowercase().starts_with("python") || self.file_ext == ".py"
    }
}

/// Outcome of one test case in one judged attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseResult {
    /// 1-based position of the originating test case in `Problem::testcases`
    pub index: usize,
    pub verdict: Verdict,
    pub time_ms: u32,
    pub memory_kb: u32,
    /// Awarded points
    pub points: u32,
    #[serde(default)]
    pub output: String,
    /// Program stderr, compiler output or an infrastructure diagnostic
    #[serde(default)]
    pub error: String,
}

impl TestCaseResult {
    /// Result carrying no measurements, used when a test case never ran
    pub fn stamped(index: usize, verdict: Verdict, error: impl Into<String>) -> Self {
        Self {
            index,
            verdict,
            time_ms: 0,
            memory_kb: 0,
            points: 0,
            output: String::new(),
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub code: String,
    pub language_id: i64,
    pub problem_id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub status: SubmissionStatus,
    #[serde(default)]
    pub time_ms: u32,
    #[serde(default)]
    pub memory_kb: u32,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub test_case_results: Vec<TestCaseResult>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub pdg: Option<Pdg>,
}

impl Submission {
    pub fn new(id: i64, code: impl Into<String>, language_id: i64, problem_id: i64, user_id: i64) -> Self {
        Self {
            id,
            code: code.into(),
            language_id,
            problem_id,
            user_id,
            status: SubmissionStatus::Pending,
            time_ms: 0,
            memory_kb: 0,
            score: 0,
            test_case_results: Vec::new(),
            error_message: None,
            pdg: None,
        }
    }
}

/// Everything a judging pass writes back, committed as one unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeOutcome {
    pub status: SubmissionStatus,
    pub time_ms: u32,
    pub memory_kb: u32,
    pub score: u32,
    pub results: Vec<TestCaseResult>,
    pub error_message: Option<String>,
}

impl JudgeOutcome {
    /// Derive aggregates from a full result set
    pub fn from_results(mut results: Vec<TestCaseResult>) -> (Self, StatusCategory) {
        results.sort_by_key(|r| r.index);

        let worst = StatusCategory::worst_of(results.iter().map(|r| r.verdict));
        let time_ms = results.iter().map(|r| r.time_ms).max().unwrap_or(0);
        let memory_kb = results.iter().map(|r| r.memory_kb).max().unwrap_or(0);
        let score = results.iter().map(|r| r.points).sum();

        let outcome = Self {
            status: worst.into(),
            time_ms,
            memory_kb,
            score,
            results,
            error_message: None,
        };
        (outcome, worst)
    }

    /// Every test case stamped with the same failure
    pub fn failed(testcase_count: usize, verdict: Verdict, message: impl Into<String>) -> Self {
        let message = message.into();
        let results = (1..=testcase_count)
            .map(|index| TestCaseResult::stamped(index, verdict, message.clone()))
            .collect();
        Self {
            status: SubmissionStatus::Error,
            time_ms: 0,
            memory_kb: 0,
            score: 0,
            results,
            error_message: Some(message),
        }
    }
}

pub const DEFAULT_PLAGIARISM_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlagiarismTask {
    pub id: i64,
    pub submission_id: i64,
    pub problem_id: i64,
    pub threshold: f64,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub result: bool,
    #[serde(default)]
    pub sim_list: Vec<f64>,
    #[serde(default)]
    pub sim_submission_id_list: Vec<i64>,
    #[serde(default)]
    pub sim_abstract: Option<SimilarityReport>,
}

impl PlagiarismTask {
    pub fn new(id: i64, submission_id: i64, problem_id: i64, threshold: f64) -> Self {
        Self {
            id,
            submission_id,
            problem_id,
            threshold,
            completed: false,
            result: false,
            sim_list: Vec::new(),
            sim_submission_id_list: Vec::new(),
            sim_abstract: None,
        }
    }
}

/// Findings of a finished plagiarism task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlagiarismOutcome {
    pub result: bool,
    pub sim_list: Vec<f64>,
    pub sim_submission_id_list: Vec<i64>,
    pub sim_abstract: Option<SimilarityReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(index: usize, verdict: Verdict, time_ms: u32, points: u32) -> TestCaseResult {
        TestCaseResult {
            index,
            verdict,
            time_ms,
            memory_kb: time_ms * 2,
            points,
            output: String::new(),
            error: String::new(),
        }
    }

    #[test]
    fn test_outcome_sorted_and_aggregated() {
        let (outcome, worst) = JudgeOutcome::from_results(vec![
            result(3, Verdict::Accepted, 30, 10),
            result(1, Verdict::WrongAnswer, 50, 0),
            result(2, Verdict::Accepted, 10, 10),
        ]);

        let order: Vec<usize> = outcome.results.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(worst, StatusCategory::WrongAnswer);
        assert_eq!(outcome.status, SubmissionStatus::Success);
        assert_eq!(outcome.time_ms, 50);
        assert_eq!(outcome.memory_kb, 100);
        assert_eq!(outcome.score, 20);
    }

    #[test]
    fn test_outcome_failed_stamps_every_case() {
        let outcome = JudgeOutcome::failed(3, Verdict::CompileError, "main.cpp:1: error");
        assert_eq!(outcome.status, SubmissionStatus::Error);
        assert_eq!(outcome.results.len(), 3);
        assert!(outcome
            .results
            .iter()
            .all(|r| r.verdict == Verdict::CompileError && r.error == "main.cpp:1: error"));
        assert_eq!(outcome.score, 0);
    }

    #[test]
    fn test_problem_defaults() {
        let problem: Problem =
            serde_json::from_str(r#"{"id": 1, "testcases": [{"input": "1 2", "expected_output": "3"}]}"#)
                .unwrap();
        assert_eq!(problem.judge_mode, JudgeMode::Standard);
        assert!(problem.time_limit_ms.is_none());
        assert!(problem.spj_code.is_none());
    }
}
