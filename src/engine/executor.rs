//! Compile and run steps
//!
//! Turns raw sandbox output into verdicts. Run steps are classified in a
//! fixed order: wait budget, CPU time, memory, exit code, then output.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::fs;
use tracing::{debug, warn};

use super::checker::SpecialJudge;
use super::sandbox::{
    execute, split_stderr, wrap_command, SandboxError, SandboxOutput, SandboxRuntime, SandboxSpec,
};
use super::workspace::write_file;
use crate::core::{JudgeMode, Language, SandboxConfig, TestCase, TestCaseResult, Verdict};

/// Points awarded for an accepted test case outside special judging
pub const POINTS_PER_CASE: u32 = 10;

/// Exit status of a process killed by SIGKILL, which is how the kernel OOM
/// killer ends a container
const OOM_EXIT_CODE: i64 = 137;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub time_ms: u32,
    pub memory_mb: u32,
}

impl Limits {
    /// Problem override, else the language default
    pub fn effective(
        problem_time_ms: Option<u32>,
        problem_memory_mb: Option<u32>,
        language: &Language,
    ) -> Self {
        Self {
            time_ms: problem_time_ms.unwrap_or(language.time_limit_ms),
            memory_mb: problem_memory_mb.unwrap_or(language.memory_limit_mb),
        }
    }

    pub fn memory_kb(&self) -> u64 {
        u64::from(self.memory_mb) * 1024
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompileOutcome {
    Compiled,
    /// `CompileError`, or `Unknown` when the sandbox itself failed
    Failed { verdict: Verdict, message: String },
}

/// One test case to run
pub struct RunCase<'a> {
    /// 1-based
    pub index: usize,
    pub testcase: &'a TestCase,
    pub language: &'a Language,
    pub dir: &'a Path,
    pub limits: Limits,
    pub judge_mode: JudgeMode,
    pub special_judge: Option<&'a SpecialJudge>,
}

pub struct Executor {
    runtime: Arc<dyn SandboxRuntime>,
    config: SandboxConfig,
}

impl Executor {
    pub fn new(runtime: Arc<dyn SandboxRuntime>, config: SandboxConfig) -> Self {
        Self { runtime, config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn runtime(&self) -> &dyn SandboxRuntime {
        self.runtime.as_ref()
    }

    pub(crate) fn spec(
        &self,
        image: &str,
        command: Vec<String>,
        dir: &Path,
        read_only: bool,
        memory_limit_mb: u32,
        wall_timeout: Duration,
    ) -> SandboxSpec {
        SandboxSpec {
            image: image.to_string(),
            command,
            host_dir: dir.to_path_buf(),
            mount_point: self.config.mount_point.clone(),
            read_only,
            memory_limit_mb,
            wall_timeout,
            network_disabled: true,
            user: self.config.user.clone(),
        }
    }

    /// Run the language's compile command over `dir`, if it has one
    pub async fn compile(
        &self,
        language: &Language,
        dir: &Path,
        memory_limit_mb: u32,
    ) -> CompileOutcome {
        let Some(compile_command) = &language.compile_command else {
            return CompileOutcome::Compiled;
        };

        let spec = self.spec(
            &language.image,
            split_command(compile_command),
            dir,
            false,
            memory_limit_mb.saturating_mul(self.config.compile_memory_factor),
            self.config.compile_timeout,
        );
        debug!("Compiling with: {}", compile_command);

        let output = match execute(self.runtime(), &spec).await {
            Ok(output) => output,
            Err(SandboxError::WaitTimeout(budget)) => {
                return CompileOutcome::Failed {
                    verdict: Verdict::CompileError,
                    message: format!("Compilation did not finish within {:?}", budget),
                }
            }
            Err(e) => {
                warn!("Compile sandbox failed: {}", e);
                return CompileOutcome::Failed {
                    verdict: Verdict::Unknown,
                    message: format!("Compile sandbox error: {}", e),
                };
            }
        };

        if output.exit_code != 0 {
            let message = if output.stderr.trim().is_empty() {
                output.stdout
            } else {
                output.stderr
            };
            return CompileOutcome::Failed {
                verdict: Verdict::CompileError,
                message,
            };
        }

        if let Some(artifact) = &language.compile_artifact {
            if fs::metadata(dir.join(artifact)).await.is_err() {
                return CompileOutcome::Failed {
                    verdict: Verdict::CompileError,
                    message: "Compiler did not produce an executable.".to_string(),
                };
            }
        }

        CompileOutcome::Compiled
    }

    /// Run one test case. Never fails: sandbox faults become `UNK` results.
    pub async fn run_test(&self, case: &RunCase<'_>) -> TestCaseResult {
        let input_file = format!("{}.in", case.index);
        if let Err(e) = write_file(case.dir, &input_file, &case.testcase.input).await {
            return TestCaseResult::stamped(
                case.index,
                Verdict::Unknown,
                format!("Runner Error: failed to write input: {}", e),
            );
        }

        let spec = self.spec(
            &case.language.image,
            wrap_command(&case.language.run_command, &input_file),
            case.dir,
            true,
            case.limits.memory_mb,
            self.config.wall_budget(case.limits.time_ms),
        );

        match execute(self.runtime(), &spec).await {
            Ok(output) => self.judge_output(case, output).await,
            Err(SandboxError::WaitTimeout(_)) => TestCaseResult {
                time_ms: case.limits.time_ms,
                ..TestCaseResult::stamped(
                    case.index,
                    Verdict::TimeLimitExceeded,
                    "Container wait timed out.",
                )
            },
            Err(e) => {
                warn!("Test case {} sandbox failed: {}", case.index, e);
                TestCaseResult::stamped(case.index, Verdict::Unknown, format!("Runner Error: {}", e))
            }
        }
    }

    async fn judge_output(&self, case: &RunCase<'_>, output: SandboxOutput) -> TestCaseResult {
        let (usage, error) = split_stderr(&output.stderr);
        let time_ms = usage.map(|u| u.cpu_ms()).unwrap_or(0);
        let memory_kb = usage
            .map(|u| u.max_rss_kb)
            .unwrap_or(0)
            .max(output.peak_memory_kb);

        let mut result = TestCaseResult {
            index: case.index,
            verdict: Verdict::Accepted,
            time_ms,
            memory_kb: u32::try_from(memory_kb).unwrap_or(u32::MAX),
            points: 0,
            output: output.stdout,
            error,
        };

        if time_ms > case.limits.time_ms {
            result.verdict = Verdict::TimeLimitExceeded;
        } else if memory_kb > case.limits.memory_kb()
            || output.exit_code == OOM_EXIT_CODE
            || output.oom_killed
        {
            result.verdict = Verdict::MemoryLimitExceeded;
        } else if output.exit_code != 0 {
            result.verdict = Verdict::RuntimeError;
        } else if case.judge_mode == JudgeMode::Spj {
            match case.special_judge {
                Some(judge) => {
                    let checked = judge
                        .check(
                            self,
                            case.index,
                            &case.testcase.input,
                            &result.output,
                            &case.testcase.expected_output,
                        )
                        .await;
                    result.verdict = checked.verdict;
                    result.points = checked.points;
                    if let Some(message) = checked.message {
                        result.error = message;
                    }
                }
                None => {
                    result.verdict = Verdict::Unknown;
                    result.error = "Special judge is not prepared".to_string();
                }
            }
        } else if outputs_match(case.judge_mode, &result.output, &case.testcase.expected_output) {
            result.points = POINTS_PER_CASE;
        } else {
            result.verdict = Verdict::WrongAnswer;
        }
        result
    }
}

/// Split a registered command into argv. Commands have already passed the
/// safety gate, so there is no quoting to honour.
pub fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

/// Output comparison for the non-special-judge modes
pub fn outputs_match(mode: JudgeMode, actual: &str, expected: &str) -> bool {
    match mode {
        JudgeMode::Strict => actual == expected,
        JudgeMode::Standard | JudgeMode::Spj => actual.trim_end() == expected.trim_end(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::engine::sandbox::SandboxHandle;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays queued outcomes and records every launched spec
    #[derive(Default)]
    pub(crate) struct ScriptedRuntime {
        pub outcomes: Mutex<VecDeque<Result<SandboxOutput, SandboxError>>>,
        pub launched: Mutex<Vec<SandboxSpec>>,
        pub removed: Mutex<usize>,
    }

    impl ScriptedRuntime {
        pub fn with(outcomes: Vec<Result<SandboxOutput, SandboxError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                ..Default::default()
            })
        }
    }

    #[async_trait]
    impl SandboxRuntime for ScriptedRuntime {
        async fn launch(&self, spec: &SandboxSpec) -> Result<SandboxHandle, SandboxError> {
            self.launched.lock().unwrap().push(spec.clone());
            Ok(SandboxHandle("scripted".into()))
        }

        async fn wait(
            &self,
            _handle: &SandboxHandle,
            _timeout: Duration,
        ) -> Result<SandboxOutput, SandboxError> {
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(SandboxOutput::default()))
        }

        async fn remove(&self, _handle: &SandboxHandle) -> Result<(), SandboxError> {
            *self.removed.lock().unwrap() += 1;
            Ok(())
        }
    }

    pub(crate) fn exited(code: i64, stdout: &str, stderr: &str) -> Result<SandboxOutput, SandboxError> {
        Ok(SandboxOutput {
            exit_code: code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            peak_memory_kb: 0,
            oom_killed: false,
        })
    }

    pub(crate) fn python() -> Language {
        Language {
            id: 2,
            name: "python".into(),
            file_ext: ".py".into(),
            compile_command: Some("python3 -m py_compile main.py".into()),
            compile_artifact: None,
            run_command: "python3 main.py".into(),
            image: "python-judge:latest".into(),
            time_limit_ms: 1000,
            memory_limit_mb: 256,
        }
    }

    fn testcase() -> TestCase {
        TestCase {
            input: "1 2".into(),
            expected_output: "3".into(),
        }
    }

    async fn run(
        outcome: Result<SandboxOutput, SandboxError>,
        mode: JudgeMode,
    ) -> (TestCaseResult, Arc<ScriptedRuntime>) {
        let runtime = ScriptedRuntime::with(vec![outcome]);
        let executor = Executor::new(runtime.clone(), SandboxConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let language = python();
        let tc = testcase();
        let case = RunCase {
            index: 1,
            testcase: &tc,
            language: &language,
            dir: dir.path(),
            limits: Limits {
                time_ms: 1000,
                memory_mb: 256,
            },
            judge_mode: mode,
            special_judge: None,
        };
        let result = executor.run_test(&case).await;
        (result, runtime)
    }

    #[tokio::test]
    async fn test_accepted_with_trailing_whitespace() {
        let (result, runtime) = run(exited(0, "3\n\n", "TIME:0.05 0.01 9000"), JudgeMode::Standard).await;
        assert_eq!(result.verdict, Verdict::Accepted);
        assert_eq!(result.points, POINTS_PER_CASE);
        assert_eq!(result.time_ms, 60);
        assert_eq!(result.memory_kb, 9000);

        let launched = runtime.launched.lock().unwrap();
        assert!(launched[0].read_only);
        assert!(launched[0].network_disabled);
        assert_eq!(launched[0].wall_timeout, Duration::from_millis(1200));
        assert_eq!(launched[0].command[2], "/usr/bin/time -f 'TIME:%U %S %M' python3 main.py < 1.in");
        assert_eq!(*runtime.removed.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_strict_mode_is_byte_exact() {
        let (result, _) = run(exited(0, "3\n", "TIME:0.01 0.00 100"), JudgeMode::Strict).await;
        assert_eq!(result.verdict, Verdict::WrongAnswer);
        assert_eq!(result.points, 0);
    }

    #[tokio::test]
    async fn test_wrong_answer() {
        let (result, _) = run(exited(0, "4\n", "TIME:0.01 0.00 100"), JudgeMode::Standard).await;
        assert_eq!(result.verdict, Verdict::WrongAnswer);
    }

    #[tokio::test]
    async fn test_cpu_time_over_limit() {
        let (result, _) = run(exited(0, "3\n", "TIME:0.98 0.05 100"), JudgeMode::Standard).await;
        assert_eq!(result.verdict, Verdict::TimeLimitExceeded);
    }

    #[tokio::test]
    async fn test_wait_timeout_is_tle() {
        let (result, _) = run(
            Err(SandboxError::WaitTimeout(Duration::from_millis(1200))),
            JudgeMode::Standard,
        )
        .await;
        assert_eq!(result.verdict, Verdict::TimeLimitExceeded);
        assert_eq!(result.time_ms, 1000);
    }

    #[tokio::test]
    async fn test_memory_limit() {
        let (result, _) = run(exited(0, "3", "TIME:0.01 0.00 300000"), JudgeMode::Standard).await;
        assert_eq!(result.verdict, Verdict::MemoryLimitExceeded);

        let (result, _) = run(exited(137, "", ""), JudgeMode::Standard).await;
        assert_eq!(result.verdict, Verdict::MemoryLimitExceeded);
    }

    #[tokio::test]
    async fn test_runtime_error_keeps_program_stderr() {
        let stderr = "ZeroDivisionError: division by zero\nCommand exited with non-zero status 1\nTIME:0.01 0.00 100";
        let (result, _) = run(exited(1, "", stderr), JudgeMode::Standard).await;
        assert_eq!(result.verdict, Verdict::RuntimeError);
        assert_eq!(result.error, "ZeroDivisionError: division by zero");
    }

    #[tokio::test]
    async fn test_runtime_failure_is_unknown() {
        let (result, _) = run(
            Err(SandboxError::Launch("no such image".into())),
            JudgeMode::Standard,
        )
        .await;
        assert_eq!(result.verdict, Verdict::Unknown);
        assert!(result.error.contains("no such image"));
    }

    #[tokio::test]
    async fn test_spj_without_judge_is_unknown() {
        let (result, _) = run(exited(0, "3", "TIME:0.01 0.00 100"), JudgeMode::Spj).await;
        assert_eq!(result.verdict, Verdict::Unknown);
    }

    #[tokio::test]
    async fn test_compile_error_carries_stderr() {
        let runtime = ScriptedRuntime::with(vec![exited(1, "", "  File \"main.py\", line 1\nSyntaxError")]);
        let executor = Executor::new(runtime.clone(), SandboxConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let outcome = executor.compile(&python(), dir.path(), 256).await;
        assert_eq!(
            outcome,
            CompileOutcome::Failed {
                verdict: Verdict::CompileError,
                message: "  File \"main.py\", line 1\nSyntaxError".into()
            }
        );
        let launched = runtime.launched.lock().unwrap();
        assert!(!launched[0].read_only);
        assert_eq!(launched[0].memory_limit_mb, 512);
        assert_eq!(launched[0].command, vec!["python3", "-m", "py_compile", "main.py"]);
    }

    #[tokio::test]
    async fn test_compile_missing_artifact() {
        let runtime = ScriptedRuntime::with(vec![exited(0, "", "")]);
        let executor = Executor::new(runtime, SandboxConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let mut cpp = python();
        cpp.compile_command = Some("g++ main.cpp -o main".into());
        cpp.compile_artifact = Some("main".into());

        let outcome = executor.compile(&cpp, dir.path(), 256).await;
        assert!(matches!(
            outcome,
            CompileOutcome::Failed {
                verdict: Verdict::CompileError,
                ..
            }
        ));

        std::fs::write(dir.path().join("main"), b"").unwrap();
        let runtime = ScriptedRuntime::with(vec![exited(0, "", "")]);
        let executor = Executor::new(runtime, SandboxConfig::default());
        assert_eq!(executor.compile(&cpp, dir.path(), 256).await, CompileOutcome::Compiled);
    }

    #[test]
    fn test_effective_limits() {
        let language = python();
        assert_eq!(
            Limits::effective(Some(500), None, &language),
            Limits {
                time_ms: 500,
                memory_mb: 256
            }
        );
    }
}
