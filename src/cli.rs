use clap::Parser;
use std::path::PathBuf;

/// swift-shell - run Swift scripts with package dependencies
///
/// Dependencies are declared as comments on import lines:
///
/// ```text
/// import Shell // @git/acrlc/shell
/// import Paths // ../paths
/// ```
///
/// The script is built once into a cached executable and rebuilt only when
/// it changes.
#[derive(Parser, Debug)]
#[command(name = "swift-shell")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run Swift scripts with package dependencies", long_about = None)]
pub struct Cli {
    /// Hide build output unless the build fails
    #[arg(short, long)]
    pub silent: bool,

    /// Build for testing (debug), allowing `@testable import`
    #[arg(short, long)]
    pub testable: bool,

    /// Experimental features to enable, comma or space separated
    #[arg(short, long, value_name = "FEATURES")]
    pub enable: Option<String>,

    /// Unsafe compiler flags without the leading dash, comma or space separated
    #[arg(short, long, value_name = "FLAGS")]
    pub flags: Option<String>,

    /// Toolchain passed to `swift build --toolchain`
    #[arg(short = 'v', long, value_name = "TOOLCHAIN")]
    pub toolchain: Option<String>,

    /// Remove build folders and the executable from the cache
    #[arg(short, long)]
    pub clean: bool,

    /// Remove the script's cached project entirely
    #[arg(short, long)]
    pub remove: bool,

    /// Rebuild even if the script hasn't changed
    #[arg(short, long)]
    pub update: bool,

    /// Open the generated package instead of building it (macOS)
    #[arg(short, long)]
    pub open: bool,

    /// Print the executable path instead of running it
    #[arg(short, long)]
    pub print: bool,

    /// Cache root directory
    #[arg(long, env = "SWIFT_SHELL_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Path to the swift executable
    #[arg(long, env = "SWIFT_SHELL_SWIFT")]
    pub swift: Option<PathBuf>,

    /// Settings file path
    #[arg(long, env = "SWIFT_SHELL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Script file followed by the arguments passed to it
    #[arg(
        value_name = "SCRIPT [ARGS]",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("swift-shell").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_combined_short_flags() {
        let cli = parse(&["-tu", "hello.swift"]);
        assert!(cli.testable);
        assert!(cli.update);
        assert!(!cli.clean);
        assert_eq!(cli.command, vec!["hello.swift"]);
    }

    #[test]
    fn test_arguments_after_script_are_forwarded() {
        let cli = parse(&["-s", "hello.swift", "-t", "--name", "world"]);
        assert!(cli.silent);
        assert!(!cli.testable);
        assert_eq!(cli.command, vec!["hello.swift", "-t", "--name", "world"]);
    }

    #[test]
    fn test_value_flags() {
        let cli = parse(&[
            "-e",
            "StrictConcurrency,BareSlashRegexLiterals",
            "--flags",
            "Ounchecked",
            "-v",
            "swift-6.0-RELEASE",
            "hello.swift",
        ]);
        assert_eq!(
            cli.enable.as_deref(),
            Some("StrictConcurrency,BareSlashRegexLiterals")
        );
        assert_eq!(cli.flags.as_deref(), Some("Ounchecked"));
        assert_eq!(cli.toolchain.as_deref(), Some("swift-6.0-RELEASE"));
    }

    #[test]
    fn test_missing_value_is_an_error() {
        assert!(Cli::try_parse_from(["swift-shell", "hello.swift", "--toolchain"]).is_ok());
        assert!(Cli::try_parse_from(["swift-shell", "--toolchain"]).is_err());
    }

    #[test]
    fn test_no_script() {
        let cli = parse(&["-c"]);
        assert!(cli.clean);
        assert!(cli.command.is_empty());
    }
}
