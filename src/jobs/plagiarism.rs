//! Plagiarism task coordinator
//!
//! Compares one submission against every other submission of the same
//! problem and language. Any fault while evaluating leaves the task
//! completed with empty findings.

use std::cmp::Ordering;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::core::{PlagiarismOutcome, PlagiarismTask, Submission};
use crate::infra::Store;
use crate::plagiarism::{build_pdg, Pdg, SimilarityReport};

/// Entries kept in a task's similarity list
pub const TOP_MATCHES: usize = 5;

/// The submission's stored PDG, or a freshly built one that is saved back
pub async fn ensure_pdg(store: &dyn Store, submission: &Submission) -> Result<Pdg> {
    if let Some(pdg) = &submission.pdg {
        return Ok(pdg.clone());
    }
    let pdg = build_pdg(&submission.code)
        .map_err(|e| anyhow!("Submission {}: {}", submission.id, e))?;
    store.save_pdg(submission.id, &pdg).await?;
    Ok(pdg)
}

pub struct PlagiarismCoordinator {
    store: Arc<dyn Store>,
    parallelism: usize,
}

impl PlagiarismCoordinator {
    pub fn new(store: Arc<dyn Store>, parallelism: usize) -> Self {
        Self {
            store,
            parallelism: parallelism.max(1),
        }
    }

    /// Evaluate a task and mark it completed
    pub async fn run(&self, task_id: i64) -> Result<PlagiarismOutcome> {
        let task = self
            .store
            .get_plagiarism_task(task_id)
            .await?
            .with_context(|| format!("Plagiarism task {} not found", task_id))?;

        let outcome = match self.evaluate(&task).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Plagiarism task {} has no findings: {:#}", task_id, e);
                PlagiarismOutcome::default()
            }
        };

        self.store
            .complete_plagiarism_task(task_id, outcome.clone())
            .await?;
        info!(
            "Plagiarism task {} finished: result={}, top={:?}",
            task_id, outcome.result, outcome.sim_list
        );
        Ok(outcome)
    }

    async fn evaluate(&self, task: &PlagiarismTask) -> Result<PlagiarismOutcome> {
        let target = self
            .store
            .get_submission(task.submission_id)
            .await?
            .with_context(|| format!("Submission {} not found", task.submission_id))?;

        let candidates: Vec<Submission> = self
            .store
            .list_submissions(task.problem_id, target.language_id)
            .await?
            .into_iter()
            .filter(|s| s.id != target.id)
            .collect();
        if candidates.is_empty() {
            info!(
                "Plagiarism task {}: no other submissions for problem {}",
                task.id, task.problem_id
            );
            return Ok(PlagiarismOutcome::default());
        }

        let target_pdg = Arc::new(ensure_pdg(self.store.as_ref(), &target).await?);
        let mut scored = self.compare_all(target_pdg, candidates).await?;

        scored.sort_by(|a, b| {
            b.1.sim_score()
                .partial_cmp(&a.1.sim_score())
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        let Some((_, best)) = scored.first() else {
            return Ok(PlagiarismOutcome::default());
        };
        let result = best.sim_score() >= task.threshold;
        let sim_abstract = Some(best.clone());

        let top = &scored[..scored.len().min(TOP_MATCHES)];
        Ok(PlagiarismOutcome {
            result,
            sim_list: top.iter().map(|(_, report)| report.sim_score()).collect(),
            sim_submission_id_list: top.iter().map(|(id, _)| *id).collect(),
            sim_abstract,
        })
    }

    /// `(candidate id, report)` for every candidate whose PDG could be built
    async fn compare_all(
        &self,
        target: Arc<Pdg>,
        candidates: Vec<Submission>,
    ) -> Result<Vec<(i64, SimilarityReport)>> {
        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut tasks = JoinSet::new();

        for candidate in candidates {
            let permit = semaphore.clone().acquire_owned().await?;
            let store = self.store.clone();
            let target = target.clone();

            tasks.spawn(async move {
                let _permit = permit;
                match ensure_pdg(store.as_ref(), &candidate).await {
                    Ok(pdg) => Some((candidate.id, SimilarityReport::generate(&target, &pdg))),
                    Err(e) => {
                        warn!("Skipping candidate: {:#}", e);
                        None
                    }
                }
            });
        }

        let mut scored = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(entry)) => scored.push(entry),
                Ok(None) => {}
                Err(e) => error!("Comparison task failed: {}", e),
            }
        }
        Ok(scored)
    }
}
