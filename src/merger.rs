//! Configuration merger: CLI args > Env vars > Settings file > Defaults
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (handled by clap's `env`)
//! 3. Settings file
//! 4. Built-in defaults (lowest priority)
//!
//! The result is a [`RunConfig`] that is built once and handed to every
//! component by reference.

use std::path::PathBuf;

use crate::cli::Cli;
use crate::config::ShellSettings;
use crate::error::ShellError;
use crate::script::{BuildMode, Maintenance};

/// What to do with the executable once it's up to date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    #[default]
    Execute,
    Print,
    Open,
}

/// Merged configuration for one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub script: PathBuf,
    /// Forwarded verbatim to the executable
    pub arguments: Vec<String>,
    pub mode: BuildMode,
    pub silent: bool,
    pub experimental_features: Vec<String>,
    pub unsafe_flags: Vec<String>,
    pub toolchain: Option<String>,
    pub maintenance: Option<Maintenance>,
    pub action: Action,
    pub cache_dir: PathBuf,
    /// Explicit builder executable; `None` searches `PATH`
    pub swift: Option<PathBuf>,
}

impl RunConfig {
    /// Defaults for running `script` with buckets under `cache_dir`
    pub fn new(script: PathBuf, cache_dir: PathBuf) -> Self {
        Self {
            script,
            arguments: Vec::new(),
            mode: BuildMode::default(),
            silent: false,
            experimental_features: Vec::new(),
            unsafe_flags: Vec::new(),
            toolchain: None,
            maintenance: None,
            action: Action::default(),
            cache_dir,
            swift: None,
        }
    }

    /// Merge the command line with the settings file
    pub fn merge(cli: Cli, settings: ShellSettings) -> Result<Self, ShellError> {
        let mut command = cli.command.into_iter();
        let script = command.next().ok_or(ShellError::MissingInput)?;
        if script.starts_with('-') && script.len() > 1 {
            return Err(ShellError::UnknownFlag(script));
        }

        let cache_dir = cli
            .cache_dir
            .or_else(|| settings.cache_dir())
            .unwrap_or_else(crate::xdg::cache_dir);

        let action = if cli.open {
            Action::Open
        } else if cli.print {
            Action::Print
        } else {
            Action::Execute
        };

        Ok(Self {
            script: PathBuf::from(script),
            arguments: command.collect(),
            mode: BuildMode::from_testable(cli.testable),
            silent: cli.silent || settings.build.silent.unwrap_or(false),
            experimental_features: cli
                .enable
                .as_deref()
                .map(split_list)
                .unwrap_or_else(|| settings.build.enable.clone()),
            unsafe_flags: cli
                .flags
                .as_deref()
                .map(split_list)
                .unwrap_or_else(|| settings.build.flags.clone()),
            toolchain: cli.toolchain.or_else(|| settings.build.toolchain.clone()),
            maintenance: Maintenance::from_flags(cli.clean, cli.remove, cli.update),
            action,
            swift: cli.swift.or_else(|| settings.swift()),
            cache_dir,
        })
    }
}

/// Split a comma or whitespace separated list, dropping empty items
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildSettings;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["swift-shell", "--cache-dir", "/tmp/cache"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a,b c"), vec!["a", "b", "c"]);
        assert_eq!(split_list(" a,, b ,"), vec!["a", "b"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_merge_defaults() {
        let config = RunConfig::merge(cli(&["hello.swift", "x", "-y"]), ShellSettings::default())
            .unwrap();

        assert_eq!(config.script, PathBuf::from("hello.swift"));
        assert_eq!(config.arguments, vec!["x", "-y"]);
        assert_eq!(config.mode, BuildMode::Release);
        assert_eq!(config.action, Action::Execute);
        assert_eq!(config.maintenance, None);
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/cache"));
        assert!(!config.silent);
    }

    #[test]
    fn test_missing_script() {
        let err = RunConfig::merge(cli(&["-t"]), ShellSettings::default()).unwrap_err();
        assert!(matches!(err, ShellError::MissingInput));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_unknown_flag_before_script() {
        // clap either rejects `-x` itself or hands it over as the script
        match Cli::try_parse_from(["swift-shell", "--cache-dir", "/tmp", "-x", "hello.swift"]) {
            Err(e) => assert_eq!(e.kind(), clap::error::ErrorKind::UnknownArgument),
            Ok(cli) => {
                let err = RunConfig::merge(cli, ShellSettings::default()).unwrap_err();
                assert!(matches!(err, ShellError::UnknownFlag(ref flag) if flag == "-x"));
                assert_eq!(err.exit_code(), 1);
            }
        }
    }

    #[test]
    fn test_cli_overrides_settings() {
        let settings = ShellSettings {
            build: BuildSettings {
                toolchain: Some("from-file".to_string()),
                enable: vec!["FileFeature".to_string()],
                flags: vec!["Onone".to_string()],
                silent: Some(true),
                ..Default::default()
            },
            ..Default::default()
        };

        let config = RunConfig::merge(
            cli(&["-v", "from-cli", "-e", "A, B", "hello.swift"]),
            settings,
        )
        .unwrap();

        assert_eq!(config.toolchain.as_deref(), Some("from-cli"));
        assert_eq!(config.experimental_features, vec!["A", "B"]);
        assert_eq!(config.unsafe_flags, vec!["Onone"]);
        assert!(config.silent);
    }

    #[test]
    fn test_open_wins_over_print() {
        let config = RunConfig::merge(cli(&["-op", "hello.swift"]), ShellSettings::default())
            .unwrap();
        assert_eq!(config.action, Action::Open);
    }

    #[test]
    fn test_clean_and_update_remove() {
        let config = RunConfig::merge(cli(&["-cu", "hello.swift"]), ShellSettings::default())
            .unwrap();
        assert_eq!(config.maintenance, Some(Maintenance::Remove));
    }
}
