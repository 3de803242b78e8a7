use std::{io::Write as _, path::PathBuf, process::exit};

use colored::Colorize as _;
use cptest_core::style::{ColorTheme as _, Colorful, Highlight, Plain};
use crossterm::tty::IsTty as _;

use crate::cmd::ColorWhen;

pub fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|e| {
        eprintln!("Failed to get current dir: {}", e);
        exit(1);
    })
}

pub fn init_logger(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            let level = record.level();
            writeln!(
                buf,
                "[{}] {}",
                level.as_str().color(level.color()).bold(),
                record.args()
            )
        })
        .init();
}

pub fn highlight(when: ColorWhen) -> Box<dyn Highlight> {
    let enabled = match when {
        ColorWhen::Always => true,
        ColorWhen::Never => false,
        ColorWhen::Auto => std::io::stdout().is_tty(),
    };
    colored::control::set_override(enabled);

    if enabled {
        Box::new(Colorful)
    } else {
        Box::new(Plain)
    }
}
