use std::path::PathBuf;
use std::process::ExitCode;

use cptest_core::action;

use super::{GlobalArgs, SubcmdResult};

#[derive(Debug, clap::Args)]
pub struct Args {
    #[arg(default_value = "./")]
    dir: PathBuf,
}

pub fn exec(args: &Args, _: &GlobalArgs) -> SubcmdResult {
    action::init_config(&args.dir)?;
    Ok(ExitCode::SUCCESS)
}
