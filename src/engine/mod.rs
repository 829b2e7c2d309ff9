//! Sandboxed execution of compile and test steps

pub mod checker;
pub mod executor;
pub mod sandbox;
pub mod workspace;

pub use checker::SpecialJudge;
pub use executor::{CompileOutcome, Executor, Limits, RunCase};
pub use workspace::Workspace;
