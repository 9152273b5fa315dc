// Library interface for swift-shell
// The binary and the integration tests both build on these modules

pub mod cli;
pub mod cli_utils;
pub mod commands;
pub mod config;
pub mod config_expansion;
pub mod error;
pub mod fs;
pub mod logging;
pub mod merger;
pub mod script;
pub mod xdg;

pub use error::{exit_code_for, ShellError};
pub use merger::{Action, RunConfig};
