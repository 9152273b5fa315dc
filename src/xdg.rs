//! Per-user directories for swift-shell
//!
//! - cache root: `~/Developer/.swift.shell.cache` on macOS (or
//!   `~/Library/Developer/.swift.shell.cache` without `~/Developer`),
//!   `$XDG_CACHE_HOME/swift-shell` elsewhere
//! - settings: `$XDG_CONFIG_HOME/swift-shell/config.toml`

use std::path::{Path, PathBuf};

const APP_DIR: &str = "swift-shell";
const MACOS_CACHE_DIR: &str = ".swift.shell.cache";
const CONFIG_FILE: &str = "config.toml";

/// Default cache root for script buckets
///
/// # Example
/// ```
/// let cache_dir = swift_shell::xdg::cache_dir();
/// // macOS: ~/Developer/.swift.shell.cache
/// // Unix: ~/.cache/swift-shell or $XDG_CACHE_HOME/swift-shell
/// ```
pub fn cache_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        if let Some(home) = dirs::home_dir() {
            return macos_cache_dir(&home);
        }
    }

    if let Some(xdg_cache) = std::env::var_os("XDG_CACHE_HOME").filter(|v| !v.is_empty()) {
        PathBuf::from(xdg_cache).join(APP_DIR)
    } else if let Some(home) = dirs::home_dir() {
        home.join(".cache").join(APP_DIR)
    } else if let Some(cache) = dirs::cache_dir() {
        cache.join(APP_DIR)
    } else {
        PathBuf::from(".swift-shell-cache")
    }
}

/// `~/Developer` when it exists, else `~/Library/Developer`
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn macos_cache_dir(home: &Path) -> PathBuf {
    let developer = home.join("Developer");
    let parent = if developer.is_dir() {
        developer
    } else {
        home.join("Library").join("Developer")
    };
    parent.join(MACOS_CACHE_DIR)
}

/// Directory holding the settings file
pub fn config_dir() -> Option<PathBuf> {
    if let Some(xdg_config) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        Some(PathBuf::from(xdg_config).join(APP_DIR))
    } else {
        dirs::home_dir().map(|home| home.join(".config").join(APP_DIR))
    }
}

/// Default settings file location
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE))
}
