//! Redis job queue
//!
//! Producers `RPUSH` JSON-encoded [`WorkerJob`]s onto [`keys::JOB_QUEUE`];
//! the worker pops them with `BLPOP` and hands them to the dispatcher.

use std::time::Duration;

use anyhow::{Context, Result};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{info, warn};

use crate::jobs::WorkerJob;

/// Redis key constants
pub mod keys {
    /// Job queue key
    pub const JOB_QUEUE: &str = "oj:queue";

    /// Submission document prefix
    pub const SUBMISSION_PREFIX: &str = "oj:submission:";

    /// Set of submission ids per `<problem>:<language>`
    pub const SUBMISSION_INDEX_PREFIX: &str = "oj:submissions:";

    pub const PROBLEM_PREFIX: &str = "oj:problem:";

    pub const LANGUAGE_PREFIX: &str = "oj:language:";

    /// Plagiarism task document prefix
    pub const PLAGIARISM_PREFIX: &str = "oj:plagiarism:";

    /// Plagiarism task id counter
    pub const PLAGIARISM_NEXT_ID: &str = "oj:plagiarism:next_id";

    /// Resolved-problem counter prefix, per user
    pub const RESOLVED_PREFIX: &str = "oj:user:resolved:";

    /// Judge result channel (for pub/sub)
    pub const JUDGE_RESULT_CHANNEL: &str = "oj:judge:results";

    /// Plagiarism result channel (for pub/sub)
    pub const PLAGIARISM_RESULT_CHANNEL: &str = "oj:plagiarism:results";
}

/// Seconds a `BLPOP` blocks before the loop goes around again
const POP_TIMEOUT_SECS: f64 = 5.0;

pub struct RedisManager {
    client: redis::Client,
    conn: MultiplexedConnection,
}

impl RedisManager {
    pub async fn with_url(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = get_connection_with_retry(&client).await?;
        info!("Connected to Redis at {}", redis_url);

        Ok(Self { client, conn })
    }

    /// Block and wait for the next job from the queue.
    ///
    /// Automatically reconnects on connection failure. Malformed payloads
    /// are logged and skipped.
    pub async fn pop_job(&mut self) -> Result<WorkerJob> {
        loop {
            let result: Option<(String, String)> =
                match self.conn.blpop(keys::JOB_QUEUE, POP_TIMEOUT_SECS).await {
                    Ok(res) => res,
                    Err(e) => {
                        warn!("Redis BLPOP failed: {}. Reconnecting...", e);
                        self.reconnect().await?;
                        continue;
                    }
                };

            if let Some((_, job_data)) = result {
                match serde_json::from_str::<WorkerJob>(&job_data) {
                    Ok(job) => return Ok(job),
                    Err(e) => {
                        warn!("Failed to parse job data: {}. Data: {}", e, job_data);
                        continue;
                    }
                }
            }
        }
    }

    async fn reconnect(&mut self) -> Result<()> {
        self.conn = get_connection_with_retry(&self.client).await?;
        Ok(())
    }
}

/// Get a Redis connection with retry logic
async fn get_connection_with_retry(
    client: &redis::Client,
) -> Result<MultiplexedConnection> {
    loop {
        match client.get_multiplexed_async_connection().await {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                warn!(
                    "Failed to connect to Redis: {}. Retrying in 3 seconds...",
                    e
                );
                tokio::time::sleep(Duration::from_secs(3)).await;
            }
        }
    }
}
