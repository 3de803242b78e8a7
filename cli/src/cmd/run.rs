use std::path::PathBuf;
use std::process::ExitCode;

use cptest_core::{action, proc::ExitKind, style::Highlight, testing::TestCommand, Config};

use crate::util;

use super::{GlobalArgs, SubcmdResult};

#[derive(Debug, clap::Args)]
pub struct Args {
    #[arg()] // positional argument
    pub program_file_or_dir: Option<PathBuf>,

    /// Run command used instead of the configured one
    #[arg(long)]
    pub run: Option<String>,
}

pub async fn exec(args: &Args, _global_args: &GlobalArgs, hl: &dyn Highlight) -> SubcmdResult {
    let cur_dir = util::current_dir();
    let cfg = Config::load(&cur_dir)?.test;

    let cmd: TestCommand = match (&args.program_file_or_dir, &args.run) {
        (None, Some(run)) => TestCommand::new(None, run),
        (path, run) => {
            let program_file = action::determine_program_file(path.as_deref(), &cur_dir, &cfg)?;
            action::resolve_test_command(Some(&program_file), run.as_deref(), &cfg)?
        }
    };

    if cfg.compile_before_run && cmd.is_compile_cmd_defined() {
        cmd.compile(&cptest_core::proc::ProcessRunner::new().shell(&cfg.shell))
            .await?;
    }

    let exit = action::run_interactive(&cmd.run, &cfg.shell, hl).await?;
    Ok(match exit {
        ExitKind::Normal(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        ExitKind::Signaled(signo) => ExitCode::from(128u8.wrapping_add(signo as u8)),
        ExitKind::TimedOut => ExitCode::FAILURE,
    })
}
