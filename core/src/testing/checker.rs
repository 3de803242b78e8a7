use std::{path::Path, time::Duration};

use maplit::hashmap;

use crate::{
    proc::{ExitKind, Input, Output, ProcError, ProcessRunner},
    str_interp::{interp, InterpError},
};

/// External program that decides whether an output is acceptable.
///
/// Exit code `0` means the outputs are equivalent, `1` means they differ and
/// anything else is a checker failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checker {
    template: String,
    time_budget: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckerOutcome {
    pub exit_code: i32,
    pub log: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckerJudgement {
    Equivalent,
    Different,
    Unknown(i32),
}

#[derive(Debug, thiserror::Error)]
pub enum CheckerError {
    #[error("Invalid checker command")]
    Template(#[from] InterpError),

    #[error("Could not execute checker")]
    Spawn(#[from] ProcError),

    #[error("Could not execute checker (shell exited with {code}): {}", .log.trim_end())]
    Launch { code: i32, log: String },

    #[error("Checker did not finish within {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("Checker was killed by signal {0}")]
    Signaled(i32),
}

impl CheckerOutcome {
    pub fn judgement(&self) -> CheckerJudgement {
        match self.exit_code {
            0 => CheckerJudgement::Equivalent,
            1 => CheckerJudgement::Different,
            code => CheckerJudgement::Unknown(code),
        }
    }
}

impl Default for Checker {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TEMPLATE)
    }
}

impl Checker {
    pub const DEFAULT_TEMPLATE: &str = "diff #{outputFile} #{expectedFile} 1>&2";
    pub const TIME_BUDGET: Duration = Duration::from_secs(60);
    const LOG_MAX_BYTES: usize = 64 * 1024;

    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            time_budget: Self::TIME_BUDGET,
        }
    }

    #[cfg(test)]
    fn time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn command_for(
        &self,
        input: &Path,
        output: &Path,
        expected: &Path,
    ) -> Result<String, InterpError> {
        let vars = hashmap! {
            "inputFile" => input.as_os_str(),
            "outputFile" => output.as_os_str(),
            "expectedFile" => expected.as_os_str(),
        };
        interp(&self.template, &vars)
    }

    pub async fn check(
        &self,
        runner: &ProcessRunner,
        input: &Path,
        output: &Path,
        expected: &Path,
    ) -> Result<CheckerOutcome, CheckerError> {
        let cmd = self.command_for(input, output, expected)?;
        log::debug!("Checker: {}", cmd);

        let res = runner
            .run(
                &cmd,
                self.time_budget,
                Input::Null,
                Output::Discard,
                Output::capture(Self::LOG_MAX_BYTES),
            )
            .await?;
        let log = String::from_utf8_lossy(&res.stderr).into_owned();

        match res.exit {
            // POSIX shells report "cannot execute" and "not found" this way.
            ExitKind::Normal(code @ (126 | 127)) => Err(CheckerError::Launch { code, log }),
            ExitKind::Normal(exit_code) => Ok(CheckerOutcome { exit_code, log }),
            ExitKind::TimedOut => Err(CheckerError::TimedOut(self.time_budget)),
            ExitKind::Signaled(signo) => Err(CheckerError::Signaled(signo)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Files {
        _dir: tempfile::TempDir,
        input: std::path::PathBuf,
        output: std::path::PathBuf,
        expected: std::path::PathBuf,
    }

    fn files(output: &str, expected: &str) -> Files {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("1.in");
        let out = dir.path().join("out");
        let exp = dir.path().join("1.out");
        std::fs::write(&input, "2 3\n").unwrap();
        std::fs::write(&out, output).unwrap();
        std::fs::write(&exp, expected).unwrap();
        Files {
            _dir: dir,
            input,
            output: out,
            expected: exp,
        }
    }

    async fn check(template: &str, f: &Files) -> Result<CheckerOutcome, CheckerError> {
        Checker::new(template)
            .check(&ProcessRunner::new(), &f.input, &f.output, &f.expected)
            .await
    }

    #[tokio::test]
    async fn default_checker_accepts_identical_output() {
        let f = files("5\n", "5\n");
        let outcome = check(Checker::DEFAULT_TEMPLATE, &f).await.unwrap();
        assert_eq!(outcome.judgement(), CheckerJudgement::Equivalent);
        assert_eq!(outcome.log, "");
    }

    #[tokio::test]
    async fn default_checker_rejects_different_output_with_log() {
        let f = files("4\n", "3\n");
        let outcome = check(Checker::DEFAULT_TEMPLATE, &f).await.unwrap();
        assert_eq!(outcome.judgement(), CheckerJudgement::Different);
        assert!(outcome.log.contains('4') && outcome.log.contains('3'), "{}", outcome.log);
    }

    #[tokio::test]
    async fn other_exit_codes_are_unknown() {
        let f = files("", "");
        let outcome = check("echo confused >&2; exit 3", &f).await.unwrap();
        assert_eq!(outcome.judgement(), CheckerJudgement::Unknown(3));
        assert_eq!(outcome.log, "confused\n");
    }

    #[tokio::test]
    async fn checker_receives_all_three_paths() {
        let f = files("x", "x");
        let tmpl = "[ -f #{inputFile} ] && [ -f #{outputFile} ] && [ -f #{expectedFile} ]";
        let outcome = check(tmpl, &f).await.unwrap();
        assert_eq!(outcome.judgement(), CheckerJudgement::Equivalent);
    }

    #[tokio::test]
    async fn missing_checker_executable_is_a_launch_error() {
        let f = files("", "");
        let err = check("/nonexistent/checker #{outputFile}", &f)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckerError::Launch { code: 127, .. }), "{:?}", err);
    }

    #[tokio::test]
    async fn unknown_placeholder_is_a_template_error() {
        let f = files("", "");
        let err = check("cmp #{answerFile}", &f).await.unwrap_err();
        assert!(matches!(err, CheckerError::Template(InterpError::UndefinedVar(..))));

        let msg = format!("{:#}", anyhow::Error::from(err));
        assert_eq!(msg.matches("answerFile").count(), 1, "{}", msg);
    }

    #[tokio::test]
    async fn killed_checker_is_an_error() {
        let f = files("", "");
        let err = check("kill -KILL $$", &f).await.unwrap_err();
        assert!(matches!(err, CheckerError::Signaled(9)), "{:?}", err);
    }

    #[tokio::test]
    async fn checker_over_budget_is_an_error() {
        let f = files("", "");
        let budget = Duration::from_millis(200);
        let err = Checker::new("sleep 5")
            .time_budget(budget)
            .check(&ProcessRunner::new(), &f.input, &f.output, &f.expected)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckerError::TimedOut(d) if d == budget), "{:?}", err);
    }
}
