//! Online judge core
//!
//! Sandboxed judging of submissions and structural plagiarism detection
//! for Python submissions, behind a small job-queue facade.

pub mod core;
pub mod engine;
pub mod infra;
pub mod jobs;
pub mod plagiarism;

use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::info;

use crate::core::model::DEFAULT_PLAGIARISM_THRESHOLD;
use crate::core::Config;
use crate::engine::sandbox::SandboxRuntime;
use crate::engine::Executor;
use crate::infra::Store;
use crate::jobs::{Dispatcher, JobRunner, WorkerJob};
use crate::plagiarism::Pdg;

/// Entry points of the judging core
pub struct JudgeCore {
    store: Arc<dyn Store>,
    runner: Arc<JobRunner>,
    dispatcher: Dispatcher,
}

impl JudgeCore {
    /// Start `config.workers` workers over the given store and sandbox runtime
    pub fn start(config: &Config, store: Arc<dyn Store>, runtime: Arc<dyn SandboxRuntime>) -> Self {
        let executor = Arc::new(Executor::new(runtime, config.sandbox.clone()));
        let runner = Arc::new(JobRunner::new(store.clone(), executor, config));
        let dispatcher = Dispatcher::spawn(runner.clone(), config.workers, config.queue_capacity);
        info!(
            "Judge core started: {} workers, queue capacity {}",
            config.workers, config.queue_capacity
        );
        Self {
            store,
            runner,
            dispatcher,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Queue any job, e.g. one popped from an external queue
    pub async fn submit(&self, job: WorkerJob) -> Result<()> {
        self.dispatcher.submit(job).await
    }

    pub async fn enqueue_judge(&self, submission_id: i64) -> Result<()> {
        self.submit(WorkerJob::Judge { submission_id }).await
    }

    pub async fn enqueue_rejudge(&self, submission_id: i64) -> Result<()> {
        self.submit(WorkerJob::Rejudge { submission_id }).await
    }

    /// Create the task right away and evaluate it in the background.
    /// `threshold` defaults to [`DEFAULT_PLAGIARISM_THRESHOLD`].
    pub async fn enqueue_plagiarism(
        &self,
        problem_id: i64,
        submission_id: i64,
        threshold: Option<f64>,
    ) -> Result<i64> {
        let threshold = threshold.unwrap_or(DEFAULT_PLAGIARISM_THRESHOLD);
        if !(0.0..=1.0).contains(&threshold) {
            bail!("Threshold must be within [0, 1], got {}", threshold);
        }
        let task = self
            .store
            .create_plagiarism_task(submission_id, problem_id, threshold)
            .await?;
        self.submit(WorkerJob::Plagiarism { task_id: task.id }).await?;
        Ok(task.id)
    }

    /// Build a submission's PDG now and persist it
    pub async fn build_pdg(&self, submission_id: i64) -> Result<Pdg> {
        self.runner.build_pdg(submission_id).await
    }

    /// Stop accepting jobs and wait for the queued ones
    pub async fn shutdown(self) {
        self.dispatcher.shutdown().await;
        info!("Judge core stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Problem, Submission, SubmissionStatus, TestCase, Verdict};
    use crate::engine::executor::tests::{exited, python, ScriptedRuntime};
    use crate::infra::MemoryStore;

    async fn core_with(
        outcomes: Vec<Result<engine::sandbox::SandboxOutput, engine::sandbox::SandboxError>>,
    ) -> (JudgeCore, Arc<MemoryStore>, tempfile::TempDir) {
        let store = Arc::new(MemoryStore::new());
        store.insert_language(python()).await.unwrap();
        store
            .insert_problem(Problem {
                id: 1,
                time_limit_ms: Some(1000),
                memory_limit_mb: None,
                testcases: vec![TestCase {
                    input: "1 2".into(),
                    expected_output: "3".into(),
                }],
                judge_mode: Default::default(),
                spj_code: None,
                spj_language_id: None,
            })
            .await
            .unwrap();

        let workdir = tempfile::tempdir().unwrap();
        let config = Config {
            workdir: workdir.path().to_path_buf(),
            workers: 1,
            test_parallelism: 1,
            ..Config::default()
        };
        let core = JudgeCore::start(&config, store.clone(), ScriptedRuntime::with(outcomes));
        (core, store, workdir)
    }

    #[tokio::test]
    async fn test_enqueued_submission_reaches_terminal_status() {
        let (core, store, _dir) =
            core_with(vec![exited(0, "", ""), exited(0, "3\n", "TIME:0.01 0.00 7000")]).await;
        store
            .insert_submission(Submission::new(
                1,
                "print(sum(map(int,input().split())))",
                2,
                1,
                5,
            ))
            .await
            .unwrap();

        core.enqueue_judge(1).await.unwrap();
        core.shutdown().await;

        let submission = store.get_submission(1).await.unwrap().unwrap();
        assert_eq!(submission.status, SubmissionStatus::Success);
        assert_eq!(submission.test_case_results[0].verdict, Verdict::Accepted);
        assert_eq!(submission.score, 10);
    }

    #[tokio::test]
    async fn test_plagiarism_task_id_is_returned_synchronously() {
        let (core, store, _dir) = core_with(vec![]).await;
        store
            .insert_submission(Submission::new(1, "a,b=map(int,input().split());print(a+b)\n", 2, 1, 5))
            .await
            .unwrap();
        store
            .insert_submission(Submission::new(2, "x,y=map(int,input().split());print(x+y)\n", 2, 1, 6))
            .await
            .unwrap();

        let task_id = core.enqueue_plagiarism(1, 1, None).await.unwrap();
        let pending = store.get_plagiarism_task(task_id).await.unwrap().unwrap();
        assert!((pending.threshold - DEFAULT_PLAGIARISM_THRESHOLD).abs() < 1e-9);

        assert!(core.enqueue_plagiarism(1, 1, Some(1.5)).await.is_err());
        core.shutdown().await;

        let task = store.get_plagiarism_task(task_id).await.unwrap().unwrap();
        assert!(task.completed);
        assert!(task.result);
        assert_eq!(task.sim_submission_id_list, vec![2]);
    }

    #[tokio::test]
    async fn test_build_pdg_persists() {
        let (core, store, _dir) = core_with(vec![]).await;
        store
            .insert_submission(Submission::new(3, "x = 1\nprint(x)\n", 2, 1, 5))
            .await
            .unwrap();

        let pdg = core.build_pdg(3).await.unwrap();
        assert_eq!(store.get_submission(3).await.unwrap().unwrap().pdg, Some(pdg));
        assert!(core.build_pdg(404).await.is_err());
        core.shutdown().await;
    }
}
