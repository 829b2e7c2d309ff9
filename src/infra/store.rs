//! Persistence contract
//!
//! Submissions, problems, languages and plagiarism tasks are the only
//! shared mutable state of the core. A judging pass writes its result set
//! through [`Store::commit_judgement`] in one step, so readers never see a
//! partial set of test case results.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::{
    JudgeOutcome, Language, PlagiarismOutcome, PlagiarismTask, Problem, Submission,
    SubmissionStatus,
};
use crate::plagiarism::Pdg;

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_submission(&self, id: i64) -> Result<Option<Submission>>;
    async fn get_problem(&self, id: i64) -> Result<Option<Problem>>;
    async fn get_language(&self, id: i64) -> Result<Option<Language>>;

    async fn insert_submission(&self, submission: Submission) -> Result<()>;
    async fn insert_problem(&self, problem: Problem) -> Result<()>;
    async fn insert_language(&self, language: Language) -> Result<()>;

    async fn set_status(&self, id: i64, status: SubmissionStatus) -> Result<()>;

    /// Status, aggregates and the full result set, all or nothing
    async fn commit_judgement(&self, id: i64, outcome: &JudgeOutcome) -> Result<()>;

    /// Back to `Pending` with zeroed aggregates, no results and no PDG
    async fn reset_submission(&self, id: i64) -> Result<()>;

    async fn save_pdg(&self, id: i64, pdg: &Pdg) -> Result<()>;

    /// Every submission for a problem in one language, ordered by id
    async fn list_submissions(&self, problem_id: i64, language_id: i64) -> Result<Vec<Submission>>;

    /// Returns the new count
    async fn increment_resolved(&self, user_id: i64) -> Result<u64>;
    async fn resolved_count(&self, user_id: i64) -> Result<u64>;

    /// Allocate an id and persist a new, incomplete task
    async fn create_plagiarism_task(
        &self,
        submission_id: i64,
        problem_id: i64,
        threshold: f64,
    ) -> Result<PlagiarismTask>;
    async fn get_plagiarism_task(&self, id: i64) -> Result<Option<PlagiarismTask>>;
    async fn complete_plagiarism_task(&self, id: i64, outcome: PlagiarismOutcome) -> Result<()>;
}

/// Apply a finished judging pass to a submission record
pub(crate) fn apply_outcome(submission: &mut Submission, outcome: &JudgeOutcome) {
    submission.status = outcome.status;
    submission.time_ms = outcome.time_ms;
    submission.memory_kb = outcome.memory_kb;
    submission.score = outcome.score;
    submission.test_case_results = outcome.results.clone();
    submission.error_message = outcome.error_message.clone();
}

pub(crate) fn reset(submission: &mut Submission) {
    submission.status = SubmissionStatus::Pending;
    submission.time_ms = 0;
    submission.memory_kb = 0;
    submission.score = 0;
    submission.test_case_results.clear();
    submission.error_message = None;
    submission.pdg = None;
}

pub(crate) fn complete(task: &mut PlagiarismTask, outcome: PlagiarismOutcome) {
    task.completed = true;
    task.result = outcome.result;
    task.sim_list = outcome.sim_list;
    task.sim_submission_id_list = outcome.sim_submission_id_list;
    task.sim_abstract = outcome.sim_abstract;
}

#[derive(Default)]
struct Tables {
    submissions: BTreeMap<i64, Submission>,
    problems: HashMap<i64, Problem>,
    languages: HashMap<i64, Language>,
    tasks: HashMap<i64, PlagiarismTask>,
    resolved: HashMap<i64, u64>,
    last_task_id: i64,
}

impl Tables {
    fn submission_mut(&mut self, id: i64) -> Result<&mut Submission> {
        self.submissions
            .get_mut(&id)
            .with_context(|| format!("Submission {} not found", id))
    }
}

/// Process-local store; one lock guards every table
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_submission(&self, id: i64) -> Result<Option<Submission>> {
        Ok(self.tables.read().await.submissions.get(&id).cloned())
    }

    async fn get_problem(&self, id: i64) -> Result<Option<Problem>> {
        Ok(self.tables.read().await.problems.get(&id).cloned())
    }

    async fn get_language(&self, id: i64) -> Result<Option<Language>> {
        Ok(self.tables.read().await.languages.get(&id).cloned())
    }

    async fn insert_submission(&self, submission: Submission) -> Result<()> {
        self.tables
            .write()
            .await
            .submissions
            .insert(submission.id, submission);
        Ok(())
    }

    async fn insert_problem(&self, problem: Problem) -> Result<()> {
        self.tables.write().await.problems.insert(problem.id, problem);
        Ok(())
    }

    async fn insert_language(&self, language: Language) -> Result<()> {
        self.tables
            .write()
            .await
            .languages
            .insert(language.id, language);
        Ok(())
    }

    async fn set_status(&self, id: i64, status: SubmissionStatus) -> Result<()> {
        self.tables.write().await.submission_mut(id)?.status = status;
        Ok(())
    }

    async fn commit_judgement(&self, id: i64, outcome: &JudgeOutcome) -> Result<()> {
        let mut tables = self.tables.write().await;
        apply_outcome(tables.submission_mut(id)?, outcome);
        Ok(())
    }

    async fn reset_submission(&self, id: i64) -> Result<()> {
        let mut tables = self.tables.write().await;
        reset(tables.submission_mut(id)?);
        Ok(())
    }

    async fn save_pdg(&self, id: i64, pdg: &Pdg) -> Result<()> {
        self.tables.write().await.submission_mut(id)?.pdg = Some(pdg.clone());
        Ok(())
    }

    async fn list_submissions(&self, problem_id: i64, language_id: i64) -> Result<Vec<Submission>> {
        Ok(self
            .tables
            .read()
            .await
            .submissions
            .values()
            .filter(|s| s.problem_id == problem_id && s.language_id == language_id)
            .cloned()
            .collect())
    }

    async fn increment_resolved(&self, user_id: i64) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let count = tables.resolved.entry(user_id).or_default();
        *count += 1;
        Ok(*count)
    }

    async fn resolved_count(&self, user_id: i64) -> Result<u64> {
        Ok(self
            .tables
            .read()
            .await
            .resolved
            .get(&user_id)
            .copied()
            .unwrap_or(0))
    }

    async fn create_plagiarism_task(
        &self,
        submission_id: i64,
        problem_id: i64,
        threshold: f64,
    ) -> Result<PlagiarismTask> {
        let mut tables = self.tables.write().await;
        tables.last_task_id += 1;
        let task = PlagiarismTask::new(tables.last_task_id, submission_id, problem_id, threshold);
        tables.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn get_plagiarism_task(&self, id: i64) -> Result<Option<PlagiarismTask>> {
        Ok(self.tables.read().await.tasks.get(&id).cloned())
    }

    async fn complete_plagiarism_task(&self, id: i64, outcome: PlagiarismOutcome) -> Result<()> {
        let mut tables = self.tables.write().await;
        let task = tables
            .tasks
            .get_mut(&id)
            .with_context(|| format!("Plagiarism task {} not found", id))?;
        complete(task, outcome);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TestCaseResult, Verdict};
    use crate::plagiarism::build_pdg;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_commit_and_reset() {
        let store = MemoryStore::new();
        store
            .insert_submission(Submission::new(1, "print(1)", 2, 3, 4))
            .await
            .unwrap();

        let (outcome, _) = JudgeOutcome::from_results(vec![TestCaseResult {
            time_ms: 12,
            memory_kb: 2048,
            points: 10,
            ..TestCaseResult::stamped(1, Verdict::Accepted, "")
        }]);
        store.commit_judgement(1, &outcome).await.unwrap();
        store
            .save_pdg(1, &build_pdg("print(1)\n").unwrap())
            .await
            .unwrap();

        let judged = store.get_submission(1).await.unwrap().unwrap();
        assert_eq!(judged.status, SubmissionStatus::Success);
        assert_eq!(judged.score, 10);
        assert_eq!(judged.test_case_results.len(), 1);
        assert!(judged.pdg.is_some());

        store.reset_submission(1).await.unwrap();
        let reset = store.get_submission(1).await.unwrap().unwrap();
        assert_eq!(reset.status, SubmissionStatus::Pending);
        assert_eq!((reset.score, reset.time_ms, reset.memory_kb), (0, 0, 0));
        assert!(reset.test_case_results.is_empty());
        assert!(reset.pdg.is_none());
    }

    #[tokio::test]
    async fn test_missing_submission_is_an_error() {
        let store = MemoryStore::new();
        assert!(assert_ok!(store.get_submission(9).await).is_none());
        assert_err!(store.set_status(9, SubmissionStatus::Judging).await);
        assert_err!(store.reset_submission(9).await);
    }

    #[tokio::test]
    async fn test_list_filters_by_problem_and_language() {
        let store = MemoryStore::new();
        for (id, problem, language) in [(3, 1, 1), (1, 1, 1), (2, 1, 2), (4, 2, 1)] {
            store
                .insert_submission(Submission::new(id, "", language, problem, 7))
                .await
                .unwrap();
        }
        let ids: Vec<i64> = store
            .list_submissions(1, 1)
            .await
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_plagiarism_task_lifecycle() {
        let store = MemoryStore::new();
        let first = store.create_plagiarism_task(5, 1, 0.8).await.unwrap();
        let second = store.create_plagiarism_task(6, 1, 0.5).await.unwrap();
        assert_eq!((first.id, second.id), (1, 2));
        assert!(!first.completed);

        store
            .complete_plagiarism_task(
                first.id,
                PlagiarismOutcome {
                    result: true,
                    sim_list: vec![0.9],
                    sim_submission_id_list: vec![3],
                    sim_abstract: None,
                },
            )
            .await
            .unwrap();
        let done = store.get_plagiarism_task(first.id).await.unwrap().unwrap();
        assert!(done.completed && done.result);
        assert_eq!(done.sim_submission_id_list, vec![3]);
        assert_err!(
            store
                .complete_plagiarism_task(99, PlagiarismOutcome::default())
                .await
        );
    }

    #[tokio::test]
    async fn test_resolved_counter() {
        let store = MemoryStore::new();
        assert_eq!(store.resolved_count(7).await.unwrap(), 0);
        assert_eq!(store.increment_resolved(7).await.unwrap(), 1);
        assert_eq!(store.increment_resolved(7).await.unwrap(), 2);
    }
}
