/// CLI utilities for consistent output formatting
use std::io::IsTerminal;

/// Get a colored prefix
///
/// Bright cyan if stderr is a TTY, plain text otherwise.
pub fn shell_prefix() -> &'static str {
    if std::io::stderr().is_terminal() {
        "\x1b[96m[swift-shell]\x1b[0m"
    } else {
        "[swift-shell]"
    }
}

/// Print an error and its causes to stderr on one line
pub fn print_error(error: &anyhow::Error) {
    eprintln!("{} error: {:#}", shell_prefix(), error);
}
