//! Bounded job channel consumed by long-lived workers
//!
//! Producers wait when the channel is full. Shutting down closes the
//! channel and the workers exit once it is drained.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::{JobRunner, WorkerJob};

pub struct Dispatcher {
    sender: mpsc::Sender<WorkerJob>,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn spawn(runner: Arc<JobRunner>, workers: usize, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<WorkerJob>(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..workers.max(1))
            .map(|worker_id| {
                let runner = runner.clone();
                let receiver = receiver.clone();
                tokio::spawn(async move {
                    loop {
                        let job = receiver.lock().await.recv().await;
                        let Some(job) = job else { break };
                        if let Err(e) = runner.handle(job.clone()).await {
                            error!("Worker {} failed {:?}: {:#}", worker_id, job, e);
                        }
                    }
                    info!("Worker {} stopped", worker_id);
                })
            })
            .collect();

        Self { sender, workers }
    }

    /// Queue a job, waiting for room in the channel
    pub async fn submit(&self, job: WorkerJob) -> Result<()> {
        self.sender
            .send(job)
            .await
            .map_err(|e| anyhow!("Dispatcher is shut down, dropped {:?}", e.0))
    }

    /// Close the channel and wait for every queued job to finish
    pub async fn shutdown(self) {
        drop(self.sender);
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!("Worker task panicked: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Config, Submission};
    use crate::engine::executor::tests::ScriptedRuntime;
    use crate::engine::Executor;
    use crate::infra::{MemoryStore, Store};

    #[tokio::test]
    async fn test_shutdown_drains_queued_jobs() {
        let store = Arc::new(MemoryStore::new());
        for id in 1..=4 {
            store
                .insert_submission(Submission::new(id, "print(1)\n", 2, 1, 7))
                .await
                .unwrap();
        }

        let config = Config::default();
        let executor = Arc::new(Executor::new(
            ScriptedRuntime::with(vec![]),
            config.sandbox.clone(),
        ));
        let runner = Arc::new(JobRunner::new(store.clone(), executor, &config));
        let dispatcher = Dispatcher::spawn(runner, 2, 1);

        for id in 1..=4 {
            dispatcher
                .submit(WorkerJob::BuildPdg { submission_id: id })
                .await
                .unwrap();
        }
        dispatcher.shutdown().await;

        for id in 1..=4 {
            let submission = store.get_submission(id).await.unwrap().unwrap();
            assert!(submission.pdg.is_some(), "submission {} has no PDG", id);
        }
    }
}
