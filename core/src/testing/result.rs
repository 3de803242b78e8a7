use std::time::Duration;

use super::diff::DiffPreview;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum JudgeCode {
    AC,
    WA,
    TLE,
    RTE,
    FAIL,
}

/// Final result of judging one testcase.
///
/// Built once through the code-specific constructors, which keep `diff` exclusive
/// to `WA` and `checker_log` exclusive to runs that reached the checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    index: u32,
    code: JudgeCode,
    elapsed: Duration,
    fail_log: Option<String>,
    stderr_log: Option<String>,
    checker_log: Option<String>,
    diff: Option<DiffPreview>,
}

impl Verdict {
    fn new(index: u32, code: JudgeCode, elapsed: Duration) -> Self {
        Self {
            index,
            code,
            elapsed: truncate_to_millis(elapsed),
            fail_log: None,
            stderr_log: None,
            checker_log: None,
            diff: None,
        }
    }

    pub fn accepted(index: u32, elapsed: Duration, checker_log: impl Into<String>) -> Self {
        Self {
            checker_log: non_empty(checker_log.into()),
            ..Self::new(index, JudgeCode::AC, elapsed)
        }
    }

    pub fn wrong_answer(
        index: u32,
        elapsed: Duration,
        checker_log: impl Into<String>,
        diff: DiffPreview,
    ) -> Self {
        Self {
            checker_log: non_empty(checker_log.into()),
            diff: Some(diff),
            ..Self::new(index, JudgeCode::WA, elapsed)
        }
    }

    pub fn time_limit_exceeded(index: u32, elapsed: Duration) -> Self {
        Self::new(index, JudgeCode::TLE, elapsed)
    }

    pub fn runtime_error(index: u32, elapsed: Duration) -> Self {
        Self::new(index, JudgeCode::RTE, elapsed)
    }

    pub fn failed(index: u32, elapsed: Duration, fail_log: impl Into<String>) -> Self {
        Self {
            fail_log: Some(fail_log.into()),
            ..Self::new(index, JudgeCode::FAIL, elapsed)
        }
    }

    /// The checker ran but answered with an exit code outside the protocol.
    pub fn checker_failed(
        index: u32,
        elapsed: Duration,
        exit_code: i32,
        checker_log: impl Into<String>,
    ) -> Self {
        Self {
            checker_log: non_empty(checker_log.into()),
            ..Self::failed(
                index,
                elapsed,
                format!("Checker exited with unexpected code {}", exit_code),
            )
        }
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr_log = non_empty(stderr.into());
        self
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn code(&self) -> JudgeCode {
        self.code
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn fail_log(&self) -> Option<&str> {
        self.fail_log.as_deref()
    }

    pub fn stderr_log(&self) -> Option<&str> {
        self.stderr_log.as_deref()
    }

    pub fn checker_log(&self) -> Option<&str> {
        self.checker_log.as_deref()
    }

    pub fn diff(&self) -> Option<&DiffPreview> {
        self.diff.as_ref()
    }

    pub fn is_accepted(&self) -> bool {
        self.code == JudgeCode::AC
    }
}

fn truncate_to_millis(d: Duration) -> Duration {
    Duration::from_millis(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
