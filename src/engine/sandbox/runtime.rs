//! Container runtime contract
//!
//! A runtime launches one detached sandbox per step, waits for it under a
//! wall budget and force-removes it. [`execute`] strings the three together
//! and removes the instance on every path.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to launch sandbox: {0}")]
    Launch(String),
    #[error("container runtime failure: {0}")]
    Runtime(String),
    #[error("sandbox did not finish within {0:?}")]
    WaitTimeout(Duration),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Everything needed to start one sandboxed step
#[derive(Debug, Clone)]
pub struct SandboxSpec {
    pub image: String,
    /// argv executed inside the container
    pub command: Vec<String>,
    /// Host directory bind-mounted as the working directory
    pub host_dir: PathBuf,
    pub mount_point: String,
    pub read_only: bool,
    pub memory_limit_mb: u32,
    pub wall_timeout: Duration,
    pub network_disabled: bool,
    pub user: String,
}

/// Handle of a launched sandbox instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxHandle(pub String);

impl std::fmt::Display for SandboxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw result of a finished sandbox, no verdict interpretation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SandboxOutput {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    /// Peak memory from the runtime's own accounting
    pub peak_memory_kb: u64,
    pub oom_killed: bool,
}

#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    /// Create and start a sandbox running `spec.command`
    async fn launch(&self, spec: &SandboxSpec) -> Result<SandboxHandle, SandboxError>;

    /// Wait for the sandbox to exit, at most `timeout`
    async fn wait(
        &self,
        handle: &SandboxHandle,
        timeout: Duration,
    ) -> Result<SandboxOutput, SandboxError>;

    /// Force-remove the sandbox, running or not
    async fn remove(&self, handle: &SandboxHandle) -> Result<(), SandboxError>;
}

/// Launch, wait and then remove a sandbox regardless of the outcome
pub async fn execute(
    runtime: &dyn SandboxRuntime,
    spec: &SandboxSpec,
) -> Result<SandboxOutput, SandboxError> {
    let handle = runtime.launch(spec).await?;
    let result = runtime.wait(&handle, spec.wall_timeout).await;
    if let Err(e) = runtime.remove(&handle).await {
        warn!("Failed to remove sandbox {}: {}", handle, e);
    }
    result
}
