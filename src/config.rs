use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config_expansion::expand_env_vars;
use crate::error::ShellError;

/// swift-shell settings (loaded from TOML file)
///
/// ```toml
/// [cache]
/// dir = "~/.cache/swift-shell"
///
/// [build]
/// swift = "/usr/bin/swift"
/// toolchain = "swift-6.0-RELEASE"
/// silent = true
/// enable = ["StrictConcurrency"]
/// flags = ["Ounchecked"]
/// ```
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ShellSettings {
    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub build: BuildSettings,
}

/// Cache root configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    /// Cache root directory
    pub dir: Option<String>,
}

/// Build defaults, overridden by command-line flags
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BuildSettings {
    /// Path to the `swift` executable
    pub swift: Option<String>,

    /// Default `--toolchain`
    pub toolchain: Option<String>,

    /// Capture builder output unless the build fails
    pub silent: Option<bool>,

    /// Experimental features enabled on every script
    #[serde(default)]
    pub enable: Vec<String>,

    /// Unsafe compiler flags passed to every script
    #[serde(default)]
    pub flags: Vec<String>,
}

impl ShellSettings {
    /// Load settings from a TOML file, expanding environment variables in path values
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ShellError::fs(path, e))?;

        let mut settings: ShellSettings = toml::from_str(&content).map_err(|e| {
            ShellError::Config(format!("{}: {}", path.display(), e.message()))
        })?;

        settings
            .expand()
            .with_context(|| format!("Failed to expand config file: {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn expand(&mut self) -> Result<()> {
        for value in [
            &mut self.cache.dir,
            &mut self.build.swift,
            &mut self.build.toolchain,
        ]
        .into_iter()
        .flatten()
        {
            *value = expand_env_vars(value)?;
        }
        Ok(())
    }

    /// Load the explicit settings file, or the default one if it exists
    ///
    /// An explicit path must exist; a missing default file means defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match crate::xdg::config_file() {
            Some(path) if path.is_file() => {
                tracing::debug!(config = %path.display(), "using settings file");
                Self::from_file(path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ShellError> {
        for (key, values) in [("build.enable", &self.build.enable), ("build.flags", &self.build.flags)] {
            if let Some(bad) = values
                .iter()
                .find(|value| value.is_empty() || value.contains(char::is_whitespace))
            {
                return Err(ShellError::Config(format!(
                    "{} entries must be single words, got {:?}",
                    key, bad
                )));
            }
        }
        Ok(())
    }

    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.cache.dir.as_ref().map(PathBuf::from)
    }

    pub fn swift(&self) -> Option<PathBuf> {
        self.build.swift.as_ref().map(PathBuf::from)
    }
}
