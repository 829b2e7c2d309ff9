pub mod dispatcher;
pub mod judger;
pub mod plagiarism;

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::Config;
use crate::engine::Executor;
use crate::infra::Store;
use crate::jobs::judger::Judger;
use crate::jobs::plagiarism::{ensure_pdg, PlagiarismCoordinator};
use crate::plagiarism::Pdg;

pub use dispatcher::Dispatcher;

/// Worker job enum - represents different types of jobs the worker can process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "job_type")]
pub enum WorkerJob {
    /// Judge a submission
    #[serde(rename = "judge")]
    Judge { submission_id: i64 },
    /// Clear a submission's results and judge it again
    #[serde(rename = "rejudge")]
    Rejudge { submission_id: i64 },
    /// Evaluate a plagiarism task created beforehand
    #[serde(rename = "plagiarism")]
    Plagiarism { task_id: i64 },
    /// Build and store a submission's PDG
    #[serde(rename = "build_pdg")]
    BuildPdg { submission_id: i64 },
}

/// Everything a worker needs to process any [`WorkerJob`]
pub struct JobRunner {
    store: Arc<dyn Store>,
    judger: Judger,
    coordinator: PlagiarismCoordinator,
}

impl JobRunner {
    pub fn new(store: Arc<dyn Store>, executor: Arc<Executor>, config: &Config) -> Self {
        Self {
            judger: Judger::new(
                store.clone(),
                executor,
                config.workdir.clone(),
                config.test_parallelism,
            ),
            coordinator: PlagiarismCoordinator::new(store.clone(), config.plagiarism_parallelism),
            store,
        }
    }

    pub async fn handle(&self, job: WorkerJob) -> Result<()> {
        match job {
            WorkerJob::Judge { submission_id } => {
                self.judger.judge(submission_id).await?;
            }
            WorkerJob::Rejudge { submission_id } => {
                self.judger.rejudge(submission_id).await?;
            }
            WorkerJob::Plagiarism { task_id } => {
                self.coordinator.run(task_id).await?;
            }
            WorkerJob::BuildPdg { submission_id } => {
                self.build_pdg(submission_id).await?;
            }
        }
        Ok(())
    }

    /// Build (or fetch) a submission's PDG and persist it
    pub async fn build_pdg(&self, submission_id: i64) -> Result<Pdg> {
        let submission = self
            .store
            .get_submission(submission_id)
            .await?
            .with_context(|| format!("Submission {} not found", submission_id))?;
        let pdg = ensure_pdg(self.store.as_ref(), &submission).await?;
        info!(
            "PDG of submission {}: {} nodes, {} edges",
            submission_id,
            pdg.nodes.len(),
            pdg.edges.len()
        );
        Ok(pdg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_wire_format() {
        let job: WorkerJob =
            serde_json::from_str(r#"{"job_type": "plagiarism", "task_id": 4}"#).unwrap();
        assert_eq!(job, WorkerJob::Plagiarism { task_id: 4 });

        let json = serde_json::to_string(&WorkerJob::BuildPdg { submission_id: 9 }).unwrap();
        assert_eq!(json, r#"{"job_type":"build_pdg","submission_id":9}"#);

        assert!(serde_json::from_str::<WorkerJob>(r#"{"job_type": "validate"}"#).is_err());
    }
}
