use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::Context as _;
use tokio::sync::Semaphore;

use super::{
    checker::{Checker, CheckerJudgement},
    diff::DiffPreview,
    result::{JudgeCode, Verdict},
    testcase::TestCase,
};
use crate::proc::{ExitKind, Input, Output, ProcessRunner};

/// Judging progress of one testcase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JudgeState {
    Pending,
    Running,
    TimedOut,
    RuntimeError,
    Completed,
    CheckerPending,
    CheckerRunning,
    Accepted,
    WrongAnswer,
    CheckerFailed,
}

impl JudgeState {
    /// Verdict code of a terminal state, `None` while judging is in progress.
    pub fn verdict_code(self) -> Option<JudgeCode> {
        use JudgeState::*;
        match self {
            TimedOut => Some(JudgeCode::TLE),
            RuntimeError => Some(JudgeCode::RTE),
            Accepted => Some(JudgeCode::AC),
            WrongAnswer => Some(JudgeCode::WA),
            CheckerFailed => Some(JudgeCode::FAIL),
            Pending | Running | Completed | CheckerPending | CheckerRunning => None,
        }
    }

    fn can_move_to(self, next: JudgeState) -> bool {
        use JudgeState::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Running, TimedOut | RuntimeError | Completed)
                | (Completed, CheckerPending)
                | (CheckerPending, CheckerRunning)
                | (CheckerRunning, Accepted | WrongAnswer | CheckerFailed)
        )
    }
}

struct StateTracker {
    index: u32,
    state: JudgeState,
}

impl StateTracker {
    fn new(index: u32) -> Self {
        Self {
            index,
            state: JudgeState::Pending,
        }
    }

    fn enter(&mut self, next: JudgeState) {
        debug_assert!(
            self.state.can_move_to(next),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        log::debug!("Testcase #{}: {:?} -> {:?}", self.index, self.state, next);
        self.state = next;
    }
}

/// Runs the solution on testcases and judges each run with the checker.
#[derive(Debug, Clone)]
pub struct TestRunner {
    proc: ProcessRunner,
    run_cmd: String,
    checker: Checker,
    time_limit: Duration,
    stderr_capture_max_bytes: usize,
    artifact_dir: PathBuf,
}

impl TestRunner {
    pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_millis(2000);
    pub const DEFAULT_STDERR_CAPTURE_MAX_BYTES: usize = 64 * 1024;
    pub const ARTIFACT_PREFIX: &str = "cptest-output-";

    pub fn new(run_cmd: impl Into<String>) -> Self {
        Self {
            proc: ProcessRunner::new(),
            run_cmd: run_cmd.into(),
            checker: Checker::default(),
            time_limit: Self::DEFAULT_TIME_LIMIT,
            stderr_capture_max_bytes: Self::DEFAULT_STDERR_CAPTURE_MAX_BYTES,
            artifact_dir: std::env::temp_dir(),
        }
    }

    pub fn shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.proc = self.proc.shell(shell);
        self
    }

    pub fn time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = limit;
        self
    }

    pub fn checker(mut self, checker: Checker) -> Self {
        self.checker = checker;
        self
    }

    pub fn stderr_capture_max_bytes(mut self, n: usize) -> Self {
        self.stderr_capture_max_bytes = n;
        self
    }

    /// Directory for the temporary output files handed to the checker.
    pub fn artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    pub fn get_run_cmd(&self) -> &str {
        &self.run_cmd
    }

    pub fn get_time_limit(&self) -> Duration {
        self.time_limit
    }

    pub fn get_checker(&self) -> &Checker {
        &self.checker
    }

    /// Judges one testcase. Never fails: unexpected errors become `FAIL`.
    pub async fn judge(&self, t: &TestCase) -> Verdict {
        let mut tracker = StateTracker::new(t.index());
        let mut elapsed = Duration::ZERO;

        match self.try_judge(t, &mut tracker, &mut elapsed).await {
            Ok(v) => {
                debug_assert_eq!(tracker.state.verdict_code(), Some(v.code()));
                v
            }
            Err(e) => {
                log::debug!(
                    "Testcase #{}: {:?} -> FAIL: {:#}",
                    t.index(),
                    tracker.state,
                    e
                );
                Verdict::failed(t.index(), elapsed, format!("{:#}", e))
            }
        }
    }

    async fn try_judge(
        &self,
        t: &TestCase,
        tracker: &mut StateTracker,
        elapsed: &mut Duration,
    ) -> anyhow::Result<Verdict> {
        let index = t.index();
        let input = t.open_input().context("Cannot read testcase input")?;
        drop(t.open_expected().context("Cannot read testcase answer")?);
        // Removed on drop, whichever way this function returns.
        let artifact = self.create_artifact()?;
        let stdout = artifact
            .as_file()
            .try_clone()
            .with_context(|| format!("Cannot open temporary output file {:?}", artifact.path()))?;

        tracker.enter(JudgeState::Running);
        let res = self
            .proc
            .run(
                &self.run_cmd,
                self.time_limit,
                Input::File(input),
                Output::File(stdout),
                Output::capture(self.stderr_capture_max_bytes),
            )
            .await
            .context("Failed to run the solution")?;
        *elapsed = res.elapsed;
        let stderr = String::from_utf8_lossy(&res.stderr).into_owned();

        match res.exit {
            ExitKind::TimedOut => {
                tracker.enter(JudgeState::TimedOut);
                return Ok(Verdict::time_limit_exceeded(index, res.elapsed).with_stderr(stderr));
            }
            ExitKind::Normal(0) => tracker.enter(JudgeState::Completed),
            ExitKind::Normal(_) | ExitKind::Signaled(_) => {
                tracker.enter(JudgeState::RuntimeError);
                return Ok(Verdict::runtime_error(index, res.elapsed).with_stderr(stderr));
            }
        }

        tracker.enter(JudgeState::CheckerPending);
        tracker.enter(JudgeState::CheckerRunning);
        let outcome = self
            .checker
            .check(
                &self.proc,
                t.input_path(),
                artifact.path(),
                t.expected_path(),
            )
            .await?;

        let verdict = match outcome.judgement() {
            CheckerJudgement::Equivalent => {
                tracker.enter(JudgeState::Accepted);
                Verdict::accepted(index, res.elapsed, outcome.log)
            }
            CheckerJudgement::Different => {
                let diff = DiffPreview::build(t.input_path(), t.expected_path(), artifact.path())?;
                tracker.enter(JudgeState::WrongAnswer);
                Verdict::wrong_answer(index, res.elapsed, outcome.log, diff).with_stderr(stderr)
            }
            CheckerJudgement::Unknown(code) => {
                tracker.enter(JudgeState::CheckerFailed);
                Verdict::checker_failed(index, res.elapsed, code, outcome.log).with_stderr(stderr)
            }
        };

        if let Err(e) = artifact.close() {
            log::warn!("Failed to remove temporary output file: {}", e);
        }
        Ok(verdict)
    }

    fn create_artifact(&self) -> anyhow::Result<tempfile::NamedTempFile> {
        tempfile::Builder::new()
            .prefix(Self::ARTIFACT_PREFIX)
            .tempfile_in(&self.artifact_dir)
            .with_context(|| {
                format!("Cannot create temporary output file in {:?}", self.artifact_dir)
            })
    }

    /// Judges `testcases` with up to `parallelism` of them running at once.
    ///
    /// `on_verdict` is called in testcase order, as soon as every earlier
    /// testcase has been judged.
    pub async fn judge_all<F>(
        self: &Arc<Self>,
        testcases: Vec<TestCase>,
        parallelism: usize,
        mut on_verdict: F,
    ) -> Vec<Verdict>
    where
        F: FnMut(&Verdict),
    {
        let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));

        let handles: Vec<_> = testcases
            .into_iter()
            .map(|t| {
                let index = t.index();
                let runner = Arc::clone(self);
                let semaphore = Arc::clone(&semaphore);
                let handle = tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await;
                    runner.judge(&t).await
                });
                (index, handle)
            })
            .collect();

        let mut verdicts = Vec::with_capacity(handles.len());
        for (index, handle) in handles {
            let v = handle.await.unwrap_or_else(|e| {
                Verdict::failed(index, Duration::ZERO, format!("Judge task aborted: {}", e))
            });
            on_verdict(&v);
            verdicts.push(v);
        }
        verdicts
    }
}

/// Lists temporary output files left in `dir`.
pub fn list_artifacts(dir: impl AsRef<Path>) -> std::io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry
            .file_name()
            .to_string_lossy()
            .starts_with(TestRunner::ARTIFACT_PREFIX)
        {
            found.push(entry.path());
        }
    }
    Ok(found)
}
