mod cmd;
mod util;

use std::process::ExitCode;

use clap::Parser;
use cmd::GlobalArgs;

#[tokio::main]
async fn main() -> ExitCode {
    let app = GlobalArgs::parse();
    util::init_logger(app.verbose);

    app.exec_subcmd().await.unwrap_or_else(|e| {
        eprintln!("Error: {:?}", e);
        ExitCode::FAILURE
    })
}
