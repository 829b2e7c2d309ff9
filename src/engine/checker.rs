//! Special judge
//!
//! A problem-supplied program that decides a test case. It is invoked as
//! `<run command> <input> <user output> <answer>` inside its own sandbox,
//! must exit 0 and print a score in `[0, 10]` as the first token of stdout.
//! A full score is `AC`, anything lower is `WA`; every other behaviour of
//! the judge program is `UNK`.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use super::executor::{split_command, CompileOutcome, Executor};
use super::sandbox::execute;
use super::workspace::write_file;
use crate::core::{Language, Verdict};

pub const SPJ_FULL_SCORE: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub verdict: Verdict,
    pub points: u32,
    /// Diagnostic when the judge program misbehaved
    pub message: Option<String>,
}

impl CheckResult {
    fn unknown(message: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Unknown,
            points: 0,
            message: Some(message.into()),
        }
    }
}

/// A compiled (or interpretable) special judge ready to check test cases
#[derive(Debug)]
pub struct SpecialJudge {
    language: Language,
    dir: PathBuf,
}

impl SpecialJudge {
    /// Write the judge's source into `dir` and compile it when its language
    /// has a compile step
    pub async fn prepare(
        executor: &Executor,
        language: Language,
        code: &str,
        dir: PathBuf,
    ) -> Result<Self> {
        write_file(&dir, &language.source_file(), code)
            .await
            .context("Failed to write special judge source")?;

        match executor
            .compile(&language, &dir, language.memory_limit_mb)
            .await
        {
            CompileOutcome::Compiled => {}
            CompileOutcome::Failed { message, .. } => {
                bail!("Special judge failed to compile: {}", message)
            }
        }

        info!("Prepared special judge ({}) in {}", language.name, dir.display());
        Ok(Self { language, dir })
    }

    /// Decide one test case
    pub async fn check(
        &self,
        executor: &Executor,
        index: usize,
        input: &str,
        user_output: &str,
        answer: &str,
    ) -> CheckResult {
        let files = [
            (format!("{}.in", index), input),
            (format!("{}.out", index), user_output),
            (format!("{}.ans", index), answer),
        ];
        for (name, contents) in &files {
            if let Err(e) = write_file(&self.dir, name, contents).await {
                return CheckResult::unknown(format!("Special judge setup failed: {}", e));
            }
        }

        let mut command = split_command(&self.language.run_command);
        command.extend(files.into_iter().map(|(name, _)| name));

        let spec = executor.spec(
            &self.language.image,
            command,
            &self.dir,
            true,
            self.language.memory_limit_mb,
            executor.config().checker_timeout,
        );

        let output = match execute(executor.runtime(), &spec).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Special judge sandbox failed on case {}: {}", index, e);
                return CheckResult::unknown(format!("Special judge error: {}", e));
            }
        };

        if output.exit_code != 0 {
            return CheckResult::unknown(format!(
                "Special judge exited with status {}",
                output.exit_code
            ));
        }

        match parse_score(&output.stdout) {
            Some(score) => CheckResult {
                verdict: if score >= SPJ_FULL_SCORE {
                    Verdict::Accepted
                } else {
                    Verdict::WrongAnswer
                },
                // partial credit never reaches the full score
                points: score.floor() as u32,
                message: None,
            },
            None => CheckResult::unknown(format!(
                "Special judge printed no valid score: {:?}",
                output.stdout.trim()
            )),
        }
    }
}

/// First whitespace-separated token of stdout as a score in `[0, 10]`
pub fn parse_score(stdout: &str) -> Option<f64> {
    let score: f64 = stdout.split_whitespace().next()?.parse().ok()?;
    (score.is_finite() && (0.0..=SPJ_FULL_SCORE).contains(&score)).then_some(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SandboxConfig;
    use crate::engine::executor::tests::{exited, python, ScriptedRuntime};
    use crate::engine::sandbox::SandboxError;
    use std::time::Duration;

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score("10\n"), Some(10.0));
        assert_eq!(parse_score("  7 partial credit"), Some(7.0));
        assert_eq!(parse_score("2.5"), Some(2.5));
        assert_eq!(parse_score("11"), None);
        assert_eq!(parse_score("-1"), None);
        assert_eq!(parse_score("NaN"), None);
        assert_eq!(parse_score("ok"), None);
        assert_eq!(parse_score(""), None);
    }

    async fn check_with(
        outcome: Result<crate::engine::sandbox::SandboxOutput, SandboxError>,
    ) -> (CheckResult, std::sync::Arc<ScriptedRuntime>) {
        // first outcome answers the compile step
        let runtime = ScriptedRuntime::with(vec![exited(0, "", ""), outcome]);
        let executor = Executor::new(runtime.clone(), SandboxConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let judge = SpecialJudge::prepare(&executor, python(), "print(10)", dir.path().to_path_buf())
            .await
            .unwrap();
        let result = judge.check(&executor, 3, "1 2", "3", "3").await;
        assert!(dir.path().join("3.out").exists());
        (result, runtime)
    }

    #[tokio::test]
    async fn test_full_score_accepts() {
        let (result, runtime) = check_with(exited(0, "10\n", "")).await;
        assert_eq!(result.verdict, Verdict::Accepted);
        assert_eq!(result.points, 10);

        let launched = runtime.launched.lock().unwrap();
        assert_eq!(
            launched[1].command,
            vec!["python3", "main.py", "3.in", "3.out", "3.ans"]
        );
        assert_eq!(launched[1].wall_timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_partial_score_is_wrong_answer() {
        let (result, _) = check_with(exited(0, "4", "")).await;
        assert_eq!(result.verdict, Verdict::WrongAnswer);
        assert_eq!(result.points, 4);
    }

    #[tokio::test]
    async fn test_fractional_score_is_truncated() {
        let (result, _) = check_with(exited(0, "9.5", "")).await;
        assert_eq!(result.verdict, Verdict::WrongAnswer);
        assert_eq!(result.points, 9);

        let (result, _) = check_with(exited(0, "10.0", "")).await;
        assert_eq!(result.verdict, Verdict::Accepted);
        assert_eq!(result.points, 10);
    }

    #[tokio::test]
    async fn test_misbehaving_judge_is_unknown() {
        let (result, _) = check_with(exited(1, "10", "")).await;
        assert_eq!(result.verdict, Verdict::Unknown);

        let (result, _) = check_with(exited(0, "great", "")).await;
        assert_eq!(result.verdict, Verdict::Unknown);

        let (result, _) = check_with(Err(SandboxError::WaitTimeout(Duration::from_secs(10)))).await;
        assert_eq!(result.verdict, Verdict::Unknown);
        assert_eq!(result.points, 0);
    }

    #[tokio::test]
    async fn test_compile_failure_fails_preparation() {
        let runtime = ScriptedRuntime::with(vec![exited(1, "", "SyntaxError")]);
        let executor = Executor::new(runtime, SandboxConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let err = SpecialJudge::prepare(&executor, python(), "def", dir.path().to_path_buf())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("SyntaxError"));
    }
}
