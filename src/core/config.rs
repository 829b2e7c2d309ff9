//! Worker configuration
//!
//! Everything is read from the environment (after `.env` is loaded) and
//! falls back to defaults suitable for a single-host deployment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

/// Sandbox limits that do not come from a problem or language
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Container CLI binary
    pub docker_bin: String,
    /// Compile wall budget (default: 30s)
    pub compile_timeout: Duration,
    /// Compile memory limit as a multiple of the run memory limit
    pub compile_memory_factor: u32,
    /// Run wall budget as a multiple of the time limit
    pub wall_time_multiplier: f64,
    /// Special judge wall budget per test case
    pub checker_timeout: Duration,
    /// Unprivileged in-sandbox user
    pub user: String,
    /// Where the working directory is mounted inside the container
    pub mount_point: String,
    /// Interval between memory samples of a running container
    pub memory_poll_interval: Duration,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            docker_bin: "docker".into(),
            compile_timeout: Duration::from_secs(30),
            compile_memory_factor: 2,
            wall_time_multiplier: 1.2,
            checker_timeout: Duration::from_secs(10),
            user: "nobody".into(),
            mount_point: "/app".into(),
            memory_poll_interval: Duration::from_millis(100),
        }
    }
}

impl SandboxConfig {
    /// Wall-clock budget for a run step with the given CPU time limit
    pub fn wall_budget(&self, time_limit_ms: u32) -> Duration {
        Duration::from_millis((time_limit_ms as f64 * self.wall_time_multiplier).round() as u64)
    }
}

/// Which persistence backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Redis,
    Memory,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "redis" => Ok(StoreKind::Redis),
            "memory" => Ok(StoreKind::Memory),
            other => anyhow::bail!("Unknown store backend: {}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: String,
    pub store: StoreKind,
    /// Parent of every per-submission working directory
    pub workdir: PathBuf,
    /// Long-lived job workers
    pub workers: usize,
    /// Capacity of the bounded job channel
    pub queue_capacity: usize,
    /// Concurrent test cases per submission
    pub test_parallelism: usize,
    /// Concurrent comparisons per plagiarism task
    pub plagiarism_parallelism: usize,
    /// Language registry file, embedded default when `None`
    pub languages_path: Option<PathBuf>,
    pub sandbox: SandboxConfig,
}

impl Default for Config {
    fn default() -> Self {
        let cores = available_cores();
        Self {
            redis_url: "redis://localhost:6379".into(),
            store: StoreKind::Redis,
            workdir: std::env::temp_dir().join("oj-judge"),
            workers: 2,
            queue_capacity: 64,
            test_parallelism: cores,
            plagiarism_parallelism: cores,
            languages_path: None,
            sandbox: SandboxConfig::default(),
        }
    }
}

impl Config {
    /// Build the configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("REDIS_URL") {
            config.redis_url = url;
        }
        if let Ok(store) = std::env::var("OJ_STORE") {
            config.store = store.parse()?;
        }
        if let Ok(dir) = std::env::var("OJ_WORKDIR") {
            config.workdir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("OJ_LANGUAGES") {
            config.languages_path = Some(PathBuf::from(path));
        }
        if let Ok(bin) = std::env::var("OJ_DOCKER_BIN") {
            config.sandbox.docker_bin = bin;
        }

        config.workers = env_count("OJ_WORKERS", config.workers)?;
        config.queue_capacity = env_count("OJ_QUEUE_CAPACITY", config.queue_capacity)?;
        config.test_parallelism = env_count("OJ_TEST_PARALLELISM", config.test_parallelism)?;
        config.plagiarism_parallelism =
            env_count("OJ_PLAGIARISM_PARALLELISM", config.plagiarism_parallelism)?;

        Ok(config)
    }
}

fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Positive integer from the environment, `default` when unset
fn env_count(key: &str, default: usize) -> anyhow::Result<usize> {
    match std::env::var(key) {
        Ok(raw) => {
            let value = raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("Invalid {}: {}", key, raw))?;
            if value == 0 {
                anyhow::bail!("{} must be at least 1", key);
            }
            Ok(value)
        }
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wall_budget() {
        let sandbox = SandboxConfig::default();
        assert_eq!(sandbox.wall_budget(1000), Duration::from_millis(1200));
        assert_eq!(sandbox.wall_budget(2500), Duration::from_millis(3000));
    }

    #[test]
    fn test_store_kind_parse() {
        assert_eq!("memory".parse::<StoreKind>().unwrap(), StoreKind::Memory);
        assert_eq!("Redis".parse::<StoreKind>().unwrap(), StoreKind::Redis);
        assert!("postgres".parse::<StoreKind>().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.workers, 2);
        assert_eq!(config.queue_capacity, 64);
        assert!(config.test_parallelism >= 1);
        assert_eq!(config.sandbox.user, "nobody");
        assert_eq!(config.sandbox.compile_timeout, Duration::from_secs(30));
    }
}
