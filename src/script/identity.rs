/// Script identity and derived names
///
/// A script is identified by its canonical path: symlinks resolved, then
/// lower-cased and hashed. The same file reached through a symlink or with a
/// different path case therefore lands in the same cache bucket.
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use super::builder::BuildMode;
use crate::error::ShellError;
use crate::fs::FileSystem;

/// Hex characters kept from the path digest
const IDENTITY_HEX_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptIdentity {
    /// Canonical absolute path of the script
    pub path: PathBuf,
    pub hex: String,
    /// Package name: file stem with the first letter upper-cased
    pub library_name: String,
    /// Product name: file stem with the first letter lower-cased
    pub binary_name: String,
}

impl ScriptIdentity {
    /// Canonicalize `script` and derive its identity
    pub fn compute(fs: &dyn FileSystem, script: &Path) -> Result<Self, ShellError> {
        let path = fs.canonicalize(script)?;
        Ok(Self::from_canonical(path))
    }

    /// Derive the identity of an already canonical path
    pub fn from_canonical(path: PathBuf) -> Self {
        let lowered = path.to_string_lossy().to_lowercase();
        let digest = hex::encode(Sha256::digest(lowered.as_bytes()));
        let hex = digest[..IDENTITY_HEX_LEN].to_string();

        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            library_name: with_first(&stem, char::to_uppercase),
            binary_name: with_first(&stem, char::to_lowercase),
            path,
            hex,
        }
    }

    /// Cache bucket directory name: `{binaryName}-{identityHex}`
    pub fn bucket_name(&self) -> String {
        format!("{}-{}", self.binary_name, self.hex)
    }

    pub fn executable_name(&self, mode: BuildMode) -> String {
        format!("{}{}", self.binary_name, mode.executable_suffix())
    }

    /// Directory containing the script
    pub fn script_dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("/"))
    }
}

fn with_first<I>(text: &str, convert: impl Fn(char) -> I) -> String
where
    I: Iterator<Item = char>,
{
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => convert(first).chain(chars).collect(),
        None => String::new(),
    }
}
