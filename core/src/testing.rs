pub mod checker;
pub mod command;
pub mod diff;
pub mod result;
pub mod runner;
pub mod testcase;

pub use checker::*;
pub use command::*;
pub use diff::*;
pub use result::*;
pub use runner::*;
pub use testcase::*;
