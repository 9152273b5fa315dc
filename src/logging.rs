//! Structured logging for swift-shell
//!
//! Everything is written to stderr and the default level is `warn`: stdout
//! and most of stderr belong to the script being run.
//!
//! # Log Format Conventions
//!
//! - `operation`: the step being performed ("freshness", "rebuild", "clean", "remove", "update", "build")
//! - `status`: the result ("hit", "miss", "success")
//! - `bucket`: cache bucket directory name (`{binaryName}-{identityHex}`)
//! - `module`: imported module a dependency annotation belongs to
//!
//! # Examples
//!
//! ```rust
//! use tracing::info;
//!
//! let bucket = "hello-0123456789abcdef0123456789abcdef";
//! info!(operation = "freshness", status = "hit", bucket = %bucket, "cache hit");
//! ```

use std::io::{self, IsTerminal};
use std::fmt as std_fmt;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{
    fmt::{self, format::Writer},
    prelude::*,
    EnvFilter,
};

const DEFAULT_LEVEL: &str = "warn";

/// Formatter that tags lines with "swift-shell" instead of the module path
struct ShellFormatter {
    with_ansi: bool,
}

impl<S, N> FormatEvent<S, N> for ShellFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std_fmt::Result {
        let meta = event.metadata();

        write!(
            writer,
            "{} ",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.6f%:z")
        )?;

        if self.with_ansi {
            let level_style = match *meta.level() {
                tracing::Level::ERROR => "\x1b[31m",
                tracing::Level::WARN => "\x1b[33m",
                tracing::Level::INFO => "\x1b[32m",
                tracing::Level::DEBUG => "\x1b[34m",
                tracing::Level::TRACE => "\x1b[35m",
            };
            write!(writer, "{}{:5}(swift-shell)\x1b[0m: ", level_style, meta.level())?;
        } else {
            write!(writer, "{:5}(swift-shell): ", meta.level())?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Coloured, for terminals
    Pretty,
    /// Uncoloured, for CI
    Compact,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    /// Parse from `SWIFT_SHELL_LOG_FORMAT`, falling back on `CI`
    pub fn from_env() -> Self {
        Self::parse(
            &std::env::var("SWIFT_SHELL_LOG_FORMAT").unwrap_or_default(),
            std::env::var_os("CI").is_some(),
        )
    }

    fn parse(value: &str, ci: bool) -> Self {
        match value.to_lowercase().as_str() {
            "json" => Self::Json,
            "compact" => Self::Compact,
            "pretty" => Self::Pretty,
            _ if ci => Self::Compact,
            _ => Self::Pretty,
        }
    }

    /// Colours only for the pretty format on a terminal
    fn uses_ansi(self, terminal: bool) -> bool {
        self == Self::Pretty && terminal
    }
}

/// Initialize the global tracing subscriber
///
/// # Environment Variables
///
/// - `RUST_LOG`: log level filter (default `warn`)
/// - `SWIFT_SHELL_LOG_FORMAT`: "pretty", "compact" or "json"
/// - `CI`: if set, defaults to compact format
///
/// ```bash
/// RUST_LOG=swift_shell=debug swift-shell hello.swift
/// SWIFT_SHELL_LOG_FORMAT=json RUST_LOG=info swift-shell -u hello.swift
/// ```
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    let registry = tracing_subscriber::registry().with(filter);

    // A second initialisation (e.g. from tests) keeps the first subscriber
    let format = LogFormat::from_env();
    let _ = match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .event_format(ShellFormatter {
                        with_ansi: format.uses_ansi(io::stderr().is_terminal()),
                    })
                    .with_writer(io::stderr),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .event_format(ShellFormatter { with_ansi: false })
                    .with_writer(io::stderr),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_ansi(false)
                    .with_writer(io::stderr)
                    .json(),
            )
            .try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json", false), LogFormat::Json);
        assert_eq!(LogFormat::parse("JSON", true), LogFormat::Json);
        assert_eq!(LogFormat::parse("compact", false), LogFormat::Compact);
        assert_eq!(LogFormat::parse("", true), LogFormat::Compact);
        assert_eq!(LogFormat::parse("", false), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("pretty", true), LogFormat::Pretty);
    }

    #[test]
    fn test_ansi_needs_pretty_on_terminal() {
        assert!(LogFormat::Pretty.uses_ansi(true));
        assert!(!LogFormat::Pretty.uses_ansi(false));
        assert!(!LogFormat::Compact.uses_ansi(true));
        assert!(!LogFormat::Json.uses_ansi(true));
    }
}
