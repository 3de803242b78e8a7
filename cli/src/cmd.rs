pub mod init;
pub mod run;

use std::process::ExitCode;

use crate::util;

#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct GlobalArgs {
    #[command(subcommand)]
    pub subcmd: Subcommand,

    /// When to colorize the reports
    #[arg(long, value_enum, default_value_t = ColorWhen::Auto, global = true)]
    pub color: ColorWhen,

    /// Print info-level logs (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, clap::Subcommand)]
pub enum Subcommand {
    /// Judge a program against the testcases
    #[command(alias("t"))]
    Test(test::Args),

    /// Run a program with the terminal attached
    #[command(alias("r"))]
    Run(run::Args),

    /// Create an example cptest.toml
    Init(init::Args),
}

pub type SubcmdResult = anyhow::Result<ExitCode>;

impl GlobalArgs {
    pub async fn exec_subcmd(&self) -> SubcmdResult {
        use Subcommand::*;
        let hl = util::highlight(self.color);
        match &self.subcmd {
            Test(args) => test::exec(args, self, hl.as_ref()).await,
            Run(args) => run::exec(args, self, hl.as_ref()).await,
            Init(args) => init::exec(args, self),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
#[clap(rename_all = "lower")]
pub enum ColorWhen {
    Auto,
    Always,
    Never,
}
