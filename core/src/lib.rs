pub mod action;
pub mod config;
pub mod fsutil;
pub mod proc;
pub mod str_interp;
pub mod style;
pub mod testing;

pub use crate::config::Config;
