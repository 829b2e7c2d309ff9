//! Sandbox execution
//!
//! Provides the runtime contract, the Docker implementation and the CPU
//! time wrapper used inside run steps.

pub mod docker;
pub mod runtime;
pub mod time_wrapper;

pub use docker::DockerRuntime;
pub use runtime::{
    execute, SandboxError, SandboxHandle, SandboxOutput, SandboxRuntime, SandboxSpec,
};
pub use time_wrapper::{split_stderr, wrap_command, TimeUsage};
