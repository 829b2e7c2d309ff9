pub mod config;
pub mod languages;
pub mod model;
pub mod safety;
pub mod verdict;

pub use config::{Config, SandboxConfig, StoreKind};
pub use model::{
    JudgeMode, JudgeOutcome, Language, PlagiarismOutcome, PlagiarismTask, Problem, Submission,
    TestCase, TestCaseResult,
};
pub use verdict::{StatusCategory, SubmissionStatus, Verdict};
