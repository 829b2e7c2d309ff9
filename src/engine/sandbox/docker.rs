//! Docker CLI runtime
//!
//! Drives `docker run -d`, `docker wait`, `docker logs` and `docker rm -f`
//! through `tokio::process`. Peak memory is sampled with `docker stats`
//! while the container runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::runtime::{SandboxError, SandboxHandle, SandboxOutput, SandboxRuntime, SandboxSpec};
use crate::core::SandboxConfig;

pub struct DockerRuntime {
    docker_bin: String,
    poll_interval: Duration,
}

impl DockerRuntime {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            docker_bin: config.docker_bin.clone(),
            poll_interval: config.memory_poll_interval,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.docker_bin);
        cmd.kill_on_drop(true);
        cmd
    }

    async fn output(&self, args: &[&str]) -> Result<std::process::Output, SandboxError> {
        self.command()
            .args(args)
            .output()
            .await
            .map_err(|e| SandboxError::Runtime(format!("failed to run {}: {}", self.docker_bin, e)))
    }
}

/// `docker run` arguments for a spec, image and command last
pub fn run_args(spec: &SandboxSpec) -> Vec<String> {
    let mut volume = format!("{}:{}", spec.host_dir.display(), spec.mount_point);
    if spec.read_only {
        volume.push_str(":ro");
    }

    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--user".to_string(),
        spec.user.clone(),
        "--memory".to_string(),
        format!("{}m", spec.memory_limit_mb),
        "--memory-swap".to_string(),
        format!("{}m", spec.memory_limit_mb),
        "-v".to_string(),
        volume,
        "-w".to_string(),
        spec.mount_point.clone(),
    ];
    if spec.network_disabled {
        args.push("--network".to_string());
        args.push("none".to_string());
    }
    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());
    args
}

/// Parse the used half of a `docker stats` MemUsage column, e.g.
/// `12.5MiB / 256MiB`, into KiB
pub fn parse_mem_usage(column: &str) -> Option<u64> {
    let used = column.split('/').next()?.trim();
    let split = used.find(|c: char| c.is_ascii_alphabetic())?;
    let (value, unit) = used.split_at(split);
    let value: f64 = value.trim().parse().ok()?;
    let factor = match unit.trim() {
        "B" => 1.0 / 1024.0,
        "KiB" => 1.0,
        "kB" | "KB" => 1000.0 / 1024.0,
        "MiB" => 1024.0,
        "MB" => 1000.0 * 1000.0 / 1024.0,
        "GiB" => 1024.0 * 1024.0,
        "GB" => 1000.0 * 1000.0 * 1000.0 / 1024.0,
        _ => return None,
    };
    Some((value * factor).round() as u64)
}

async fn sample_memory(docker_bin: String, id: String, interval: Duration, peak: Arc<AtomicU64>) {
    loop {
        let output = Command::new(&docker_bin)
            .args(["stats", "--no-stream", "--format", "{{.MemUsage}}", &id])
            .kill_on_drop(true)
            .output()
            .await;
        if let Ok(output) = output {
            let column = String::from_utf8_lossy(&output.stdout);
            if let Some(kb) = parse_mem_usage(&column) {
                peak.fetch_max(kb, Ordering::Relaxed);
            }
        }
        tokio::time::sleep(interval).await;
    }
}

#[async_trait]
impl SandboxRuntime for DockerRuntime {
    async fn launch(&self, spec: &SandboxSpec) -> Result<SandboxHandle, SandboxError> {
        let args = run_args(spec);
        debug!("Running {} with args: {:?}", self.docker_bin, args);

        let output = self
            .command()
            .args(&args)
            .output()
            .await
            .map_err(|e| SandboxError::Launch(format!("failed to run {}: {}", self.docker_bin, e)))?;

        if !output.status.success() {
            return Err(SandboxError::Launch(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if id.is_empty() {
            return Err(SandboxError::Launch("docker run printed no container id".into()));
        }
        Ok(SandboxHandle(id))
    }

    async fn wait(
        &self,
        handle: &SandboxHandle,
        timeout: Duration,
    ) -> Result<SandboxOutput, SandboxError> {
        let peak = Arc::new(AtomicU64::new(0));
        let sampler = tokio::spawn(sample_memory(
            self.docker_bin.clone(),
            handle.0.clone(),
            self.poll_interval,
            peak.clone(),
        ));

        let waited = tokio::time::timeout(timeout, self.output(&["wait", &handle.0])).await;
        sampler.abort();

        let output = waited.map_err(|_| SandboxError::WaitTimeout(timeout))??;
        if !output.status.success() {
            return Err(SandboxError::Runtime(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        let exit_code = String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse::<i64>()
            .map_err(|e| SandboxError::Runtime(format!("unexpected docker wait output: {}", e)))?;

        let logs = self.output(&["logs", &handle.0]).await?;
        let inspect = self
            .output(&["inspect", "-f", "{{.State.OOMKilled}}", &handle.0])
            .await?;
        let oom_killed = String::from_utf8_lossy(&inspect.stdout).trim() == "true";

        Ok(SandboxOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&logs.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&logs.stderr).into_owned(),
            peak_memory_kb: peak.load(Ordering::Relaxed),
            oom_killed,
        })
    }

    async fn remove(&self, handle: &SandboxHandle) -> Result<(), SandboxError> {
        let output = self.output(&["rm", "-f", &handle.0]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // already gone
            if !stderr.contains("No such container") {
                return Err(SandboxError::Runtime(stderr.trim().to_string()));
            }
        }
        Ok(())
    }
}
