//! Judge orchestrator
//!
//! Drives one submission through `Pending → Compiling → Judging` and
//! commits a terminal `Success`/`Error` outcome. Any failure of the pass
//! itself still ends in a committed `Error` with every test case `UNK`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::core::{
    JudgeMode, JudgeOutcome, Language, Problem, StatusCategory, Submission, SubmissionStatus,
    TestCaseResult, Verdict,
};
use crate::engine::workspace::write_file;
use crate::engine::{CompileOutcome, Executor, Limits, RunCase, SpecialJudge, Workspace};
use crate::infra::Store;
use crate::plagiarism::build_pdg;

pub struct Judger {
    store: Arc<dyn Store>,
    executor: Arc<Executor>,
    workdir: PathBuf,
    test_parallelism: usize,
}

impl Judger {
    pub fn new(
        store: Arc<dyn Store>,
        executor: Arc<Executor>,
        workdir: PathBuf,
        test_parallelism: usize,
    ) -> Self {
        Self {
            store,
            executor,
            workdir,
            test_parallelism: test_parallelism.max(1),
        }
    }

    /// Judge a submission and return its terminal status
    pub async fn judge(&self, submission_id: i64) -> Result<SubmissionStatus> {
        match self.run(submission_id).await {
            Ok(status) => Ok(status),
            Err(e) => {
                error!("Judging submission {} failed: {:#}", submission_id, e);
                let outcome = JudgeOutcome::failed(
                    self.testcase_count(submission_id).await,
                    Verdict::Unknown,
                    format!("Main orchestrator failed: {:#}", e),
                );
                self.store
                    .commit_judgement(submission_id, &outcome)
                    .await
                    .context("Failed to record orchestrator failure")?;
                Ok(outcome.status)
            }
        }
    }

    /// Judge again from scratch. Every pass starts by clearing the previous
    /// results, so this is [`Judger::judge`] under another name.
    ///
    /// A rejudge racing an in-flight pass of the same submission is not
    /// coordinated: whichever pass commits last wins.
    pub async fn rejudge(&self, submission_id: i64) -> Result<SubmissionStatus> {
        info!("Rejudging submission {}", submission_id);
        self.judge(submission_id).await
    }

    async fn run(&self, submission_id: i64) -> Result<SubmissionStatus> {
        let submission = self
            .store
            .get_submission(submission_id)
            .await?
            .with_context(|| format!("Submission {} not found", submission_id))?;
        // back to Pending with no results, so a re-entry never shows the last verdict
        self.store.reset_submission(submission_id).await?;

        let problem = self
            .store
            .get_problem(submission.problem_id)
            .await?
            .with_context(|| format!("Problem {} not found", submission.problem_id))?;
        let language = self
            .store
            .get_language(submission.language_id)
            .await?
            .with_context(|| format!("Language {} not found", submission.language_id))?;

        let limits = Limits::effective(problem.time_limit_ms, problem.memory_limit_mb, &language);
        let workspace = Workspace::create(&self.workdir, &format!("submission-{}", submission_id))
            .await
            .context("Failed to create working directory")?;
        write_file(workspace.path(), &language.source_file(), &submission.code)
            .await
            .context("Failed to write source")?;

        info!(
            "Judging submission {} (problem {}, {}, {} test cases, {}ms / {}MB)",
            submission_id,
            problem.id,
            language.name,
            problem.testcases.len(),
            limits.time_ms,
            limits.memory_mb
        );

        if language.compile_command.is_some() {
            self.store
                .set_status(submission_id, SubmissionStatus::Compiling)
                .await?;
            if let CompileOutcome::Failed { verdict, message } = self
                .executor
                .compile(&language, workspace.path(), limits.memory_mb)
                .await
            {
                info!("Submission {} failed to compile ({:?})", submission_id, verdict);
                return self
                    .finish(
                        &submission,
                        &language,
                        JudgeOutcome::failed(problem.testcases.len(), verdict, message),
                    )
                    .await;
            }
        }

        let special_judge = if problem.judge_mode == JudgeMode::Spj {
            match self.prepare_special_judge(&problem, &workspace).await {
                Ok(judge) => Some(Arc::new(judge)),
                Err(e) => {
                    warn!("Submission {}: {:#}", submission_id, e);
                    return self
                        .finish(
                            &submission,
                            &language,
                            JudgeOutcome::failed(
                                problem.testcases.len(),
                                Verdict::Unknown,
                                format!("{:#}", e),
                            ),
                        )
                        .await;
                }
            }
        } else {
            None
        };

        self.store
            .set_status(submission_id, SubmissionStatus::Judging)
            .await?;
        let language = Arc::new(language);
        let results = self
            .run_testcases(&problem, language.clone(), workspace.path(), limits, special_judge)
            .await?;

        let (outcome, worst) = JudgeOutcome::from_results(results);
        let status = self.finish(&submission, &language, outcome).await?;

        if worst == StatusCategory::Accepted {
            let resolved = self.store.increment_resolved(submission.user_id).await?;
            info!("User {} resolved count is now {}", submission.user_id, resolved);
        }
        Ok(status)
    }

    async fn prepare_special_judge(
        &self,
        problem: &Problem,
        workspace: &Workspace,
    ) -> Result<SpecialJudge> {
        let code = problem
            .spj_code
            .as_deref()
            .context("Special judge source is missing")?;
        let language_id = problem
            .spj_language_id
            .context("Special judge language is missing")?;
        let language = self
            .store
            .get_language(language_id)
            .await?
            .with_context(|| format!("Special judge language {} not found", language_id))?;

        let dir = workspace
            .subdir("spj")
            .await
            .context("Failed to create special judge directory")?;
        SpecialJudge::prepare(&self.executor, language, code, dir).await
    }

    /// Run every test case through a bounded pool, results in index order
    async fn run_testcases(
        &self,
        problem: &Problem,
        language: Arc<Language>,
        dir: &Path,
        limits: Limits,
        special_judge: Option<Arc<SpecialJudge>>,
    ) -> Result<Vec<TestCaseResult>> {
        let semaphore = Arc::new(Semaphore::new(self.test_parallelism));
        let mut tasks = JoinSet::new();

        for (i, testcase) in problem.testcases.iter().enumerate() {
            let permit = semaphore.clone().acquire_owned().await?;
            let executor = self.executor.clone();
            let language = language.clone();
            let special_judge = special_judge.clone();
            let testcase = testcase.clone();
            let dir = dir.to_path_buf();
            let judge_mode = problem.judge_mode;

            tasks.spawn(async move {
                let _permit = permit;
                let case = RunCase {
                    index: i + 1,
                    testcase: &testcase,
                    language: &language,
                    dir: &dir,
                    limits,
                    judge_mode,
                    special_judge: special_judge.as_deref(),
                };
                executor.run_test(&case).await
            });
        }

        let mut results = Vec::with_capacity(problem.testcases.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => error!("Test case task failed: {}", e),
            }
        }

        // a task that died never reported; its case is still accounted for
        for index in 1..=problem.testcases.len() {
            if !results.iter().any(|r| r.index == index) {
                results.push(TestCaseResult::stamped(
                    index,
                    Verdict::Unknown,
                    "Runner Error: test case task aborted",
                ));
            }
        }
        results.sort_by_key(|r| r.index);
        Ok(results)
    }

    async fn commit(&self, submission_id: i64, outcome: JudgeOutcome) -> Result<SubmissionStatus> {
        self.store
            .commit_judgement(submission_id, &outcome)
            .await
            .with_context(|| format!("Failed to commit submission {}", submission_id))?;
        info!(
            "Submission {} finished: {:?}, score {}, {}ms, {}KB",
            submission_id, outcome.status, outcome.score, outcome.time_ms, outcome.memory_kb
        );
        Ok(outcome.status)
    }

    /// Commit a terminal outcome, then refresh the PDG of a Python submission
    async fn finish(
        &self,
        submission: &Submission,
        language: &Language,
        outcome: JudgeOutcome,
    ) -> Result<SubmissionStatus> {
        let status = self.commit(submission.id, outcome).await?;
        if language.is_python() {
            self.attach_pdg(submission).await;
        }
        Ok(status)
    }

    /// Failures are logged only; the verdict is already committed
    async fn attach_pdg(&self, submission: &Submission) {
        match build_pdg(&submission.code) {
            Ok(pdg) => match self.store.save_pdg(submission.id, &pdg).await {
                Ok(()) => debug!(
                    "Saved PDG of submission {} ({} nodes)",
                    submission.id,
                    pdg.nodes.len()
                ),
                Err(e) => warn!("Failed to save PDG of submission {}: {:#}", submission.id, e),
            },
            Err(e) => warn!("No PDG for submission {}: {}", submission.id, e),
        }
    }

    /// Best effort, for stamping a failed pass
    async fn testcase_count(&self, submission_id: i64) -> usize {
        let Ok(Some(submission)) = self.store.get_submission(submission_id).await else {
            return 0;
        };
        match self.store.get_problem(submission.problem_id).await {
            Ok(Some(problem)) => problem.testcases.len(),
            _ => 0,
        }
    }
}
