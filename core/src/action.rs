pub mod error {
    #[allow(unused_imports)]
    pub(crate) use anyhow::{anyhow, bail, ensure, Context as _};
    pub use anyhow::{Error, Result};
}
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use error::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{Config, TestConfig};
use crate::fsutil;
use crate::proc::{ExitKind, Input, Output, ProcessRunner};
use crate::style::{self, Highlight};
use crate::testing::{Checker, TestCase, TestCommand, TestRunner, Verdict};

#[derive(Debug, Clone, Default)]
pub struct TestOptions {
    /// Print the report of accepted testcases too.
    pub show_all: bool,
}

/// Picks the program file: `path` itself, the newest matching file in `path`
/// when it is a dir, or the newest matching file in `cur_dir` when `None`.
pub fn determine_program_file(
    path: Option<&Path>,
    cur_dir: &Path,
    cfg: &TestConfig,
) -> Result<PathBuf> {
    let existing_path = match path {
        Some(path) if path.exists() => path,
        Some(path) => bail!("No such file or dir: {:?}", path),
        None => cur_dir,
    };

    if existing_path.is_dir() {
        fsutil::find_most_recently_modified_file(existing_path, |name| cfg.is_program_file(name))
            .with_context(|| format!("Cannot find target program file in {:?}", existing_path))
    } else {
        Ok(existing_path.to_owned())
    }
}

/// Builds the command to test, from `run_override` or from the config entry
/// matching `program_file`.
pub fn resolve_test_command(
    program_file: Option<&Path>,
    run_override: Option<&str>,
    cfg: &TestConfig,
) -> Result<TestCommand> {
    let cmd = match (run_override, program_file) {
        (Some(run), _) => TestCommand::new(None, run),
        (None, Some(program_file)) => {
            let filename = program_file
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .with_context(|| format!("Not a file path: {:?}", program_file))?;
            cfg.find_test_cmd_for_filename(&filename).with_context(|| {
                format!(
                    "Unconfigured test command for filename '{}' (No entry matched glob in `test.command[]`)",
                    filename
                )
            })?
        }
        (None, None) => bail!("Neither a program file nor a run command is given"),
    };

    match program_file {
        Some(path) => cmd
            .interpolate_with_program_file(path)
            .context("Invalid test command"),
        None => Ok(cmd),
    }
}

pub async fn do_test(
    cmd: TestCommand,
    testcase_dir: impl AsRef<Path>,
    cfg: &TestConfig,
    opts: &TestOptions,
    hl: &dyn Highlight,
) -> Result<Vec<Verdict>> {
    let testcase_dir = testcase_dir.as_ref();
    let testcases = TestCase::enumerate(testcase_dir).context("Failed to find testcase")?;
    if testcases.is_empty() {
        bail!(
            "No testcases is saved in {}",
            testcase_dir.to_string_lossy()
        );
    }

    if cfg.compile_before_run && cmd.is_compile_cmd_defined() {
        if let Some(compile) = &cmd.compile {
            log::info!("Compiling: {}", compile);
        }
        cmd.compile(&ProcessRunner::new().shell(&cfg.shell)).await?;
    }

    let runner = Arc::new(
        TestRunner::new(cmd.run)
            .shell(&cfg.shell)
            .time_limit(cfg.time_limit())
            .checker(Checker::new(&cfg.checker))
            .stderr_capture_max_bytes(cfg.stderr_capture_max_bytes),
    );
    log::info!("Running: {}", runner.get_run_cmd());
    log::info!("Checker: {}", runner.get_checker().template());

    let bar = ProgressBar::new(testcases.len() as u64).with_style(
        ProgressStyle::with_template("{spinner} Judging [{pos}/{len}] {msg}")
            .context("Invalid progress bar template")?,
    );
    bar.enable_steady_tick(Duration::from_millis(80));

    let verdicts = runner
        .judge_all(testcases, cfg.parallelism, |v| {
            bar.inc(1);
            if opts.show_all || !v.is_accepted() {
                bar.suspend(|| println!("{}", style::render(v, hl)));
            }
        })
        .await;
    bar.finish_and_clear();

    println!("{}", style::render_summary(&verdicts, hl));
    Ok(verdicts)
}

/// Runs `cmd` with the terminal attached. No judging.
pub async fn run_interactive(cmd: &str, shell: &Path, hl: &dyn Highlight) -> Result<ExitKind> {
    const CEILING: Duration = Duration::from_secs(60 * 60);

    println!("{}", hl.success("---- * ---- launched ---- * ----"));
    let res = ProcessRunner::new()
        .shell(shell)
        .own_process_group(false)
        .run(cmd, CEILING, Input::Inherit, Output::Inherit, Output::Inherit)
        .await?;
    println!("{}", hl.success("---- * ---- finished ---- * ----"));

    match res.exit {
        ExitKind::TimedOut => log::warn!("Killed after {}s", CEILING.as_secs()),
        exit => log::info!("Exited with {:?} in {}ms", exit, res.elapsed.as_millis()),
    }
    Ok(res.exit)
}

/// Writes the example config into `dir`.
pub fn init_config(dir: impl AsRef<Path>) -> Result<PathBuf> {
    let path = dir.as_ref().join(Config::FILENAME);
    let toml = Config::example_toml().context("Example config is not embedded")?;
    fsutil::write_new(&path, toml).context("Failed to create config")?;
    crate::print_success!("Created {}", path.to_string_lossy());
    Ok(path)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn run_override_skips_config_lookup() {
        let cfg = TestConfig::default();
        let cmd = resolve_test_command(None, Some("./a.out"), &cfg).unwrap();
        assert_eq!(cmd, TestCommand::new(None, "./a.out"));

        let cmd = resolve_test_command(Some(Path::new("x/main.py")), Some("python3 #{filePath}"), &cfg)
            .unwrap();
        assert_eq!(cmd.run, "python3 x/main.py");
    }

    #[test]
    fn unconfigured_program_file_is_an_error() {
        let cfg = TestConfig::default();
        let err = resolve_test_command(Some(Path::new("main.hs")), None, &cfg).unwrap_err();
        assert!(err.to_string().contains("main.hs"), "{}", err);
        assert!(resolve_test_command(None, None, &cfg).is_err());
    }

    #[test]
    fn program_file_is_searched_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.py"), "").unwrap();
        std::fs::write(dir.path().join("input.txt"), "").unwrap();
        let cfg = Config::from_toml(
            "[[test.command]]\npattern = \"*.py\"\nrun = \"python3 #{filePath}\"\n",
        )
        .unwrap()
        .test;

        let found = determine_program_file(None, dir.path(), &cfg).unwrap();
        assert_eq!(found, dir.path().join("main.py"));

        let missing = dir.path().join("nope.py");
        assert!(determine_program_file(Some(&missing), dir.path(), &cfg).is_err());
    }

    #[test]
    fn init_config_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = init_config(dir.path()).unwrap();
        assert!(Config::from_toml_file(path).is_ok());
        assert!(init_config(dir.path()).is_err());
    }

    #[tokio::test]
    async fn do_test_without_testcases_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let res = do_test(
            TestCommand::new(None, "true"),
            dir.path(),
            &TestConfig::default(),
            &TestOptions::default(),
            &style::Plain,
        )
        .await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn compile_error_aborts_do_test() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1.in"), "").unwrap();
        std::fs::write(dir.path().join("1.out"), "").unwrap();
        let res = do_test(
            TestCommand::new(Some("exit 1".into()), "true"),
            dir.path(),
            &TestConfig::default(),
            &TestOptions::default(),
            &style::Plain,
        )
        .await;
        assert!(res.unwrap_err().to_string().contains("Compile error"));
    }

    #[tokio::test]
    async fn do_test_judges_every_testcase() {
        let dir = tempfile::tempdir().unwrap();
        for (name, input, expected) in [("1", "2 3\n", "5\n"), ("2", "1 1\n", "3\n")] {
            std::fs::write(dir.path().join(format!("{}.in", name)), input).unwrap();
            std::fs::write(dir.path().join(format!("{}.out", name)), expected).unwrap();
        }
        let cfg = TestConfig {
            parallelism: 2,
            ..TestConfig::default()
        };
        let verdicts = do_test(
            TestCommand::new(None, "read a b; echo $((a + b))"),
            dir.path(),
            &cfg,
            &TestOptions { show_all: true },
            &style::Plain,
        )
        .await
        .unwrap();

        let codes: Vec<_> = verdicts.iter().map(|v| (v.index(), v.code())).collect();
        use crate::testing::JudgeCode::*;
        assert_eq!(codes, [(1, AC), (2, WA)]);
    }
}
