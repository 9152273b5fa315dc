//! Filesystem collaborator
//!
//! The script core never touches `std::fs` directly; it goes through
//! [`FileSystem`] so the cache and build logic can be exercised against a
//! scratch directory and so every I/O failure surfaces as
//! [`ShellError::FileSystem`] with the offending path attached.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::error::ShellError;

pub type FsResult<T> = std::result::Result<T, ShellError>;

/// A directory found while walking a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub path: PathBuf,
    pub name: String,
    pub is_symlink: bool,
}

/// File and directory primitives used by the script core
pub trait FileSystem {
    fn is_dir(&self, path: &Path) -> bool;

    fn is_file(&self, path: &Path) -> bool;

    /// Resolve symlinks and relative components into an absolute path
    fn canonicalize(&self, path: &Path) -> FsResult<PathBuf>;

    fn read_to_string(&self, path: &Path) -> FsResult<String>;

    fn read(&self, path: &Path) -> FsResult<Vec<u8>>;

    /// Replace the file at `path`, creating parent directories as needed
    fn write(&self, path: &Path, contents: &[u8]) -> FsResult<()>;

    fn create_dir_all(&self, path: &Path) -> FsResult<()>;

    /// Remove a file. Returns `false` if it did not exist.
    fn remove_file(&self, path: &Path) -> FsResult<bool>;

    /// Remove a directory tree. Returns `false` if it did not exist.
    fn remove_dir_all(&self, path: &Path) -> FsResult<bool>;

    /// Move `from` to `to`, replacing anything already at `to`
    fn rename(&self, from: &Path, to: &Path) -> FsResult<()>;

    fn modified(&self, path: &Path) -> FsResult<SystemTime>;

    /// Every directory below `root` (excluding `root`), without following links
    fn walk_dirs(&self, root: &Path) -> FsResult<Vec<DirEntryInfo>>;
}

/// [`FileSystem`] backed by the local disk
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn canonicalize(&self, path: &Path) -> FsResult<PathBuf> {
        fs::canonicalize(path).map_err(|e| ShellError::fs(path, e))
    }

    fn read_to_string(&self, path: &Path) -> FsResult<String> {
        fs::read_to_string(path).map_err(|e| ShellError::fs(path, e))
    }

    fn read(&self, path: &Path) -> FsResult<Vec<u8>> {
        fs::read(path).map_err(|e| ShellError::fs(path, e))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> FsResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                self.create_dir_all(parent)?;
            }
        }
        fs::write(path, contents).map_err(|e| ShellError::fs(path, e))
    }

    fn create_dir_all(&self, path: &Path) -> FsResult<()> {
        fs::create_dir_all(path).map_err(|e| ShellError::fs(path, e))
    }

    fn remove_file(&self, path: &Path) -> FsResult<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ShellError::fs(path, e)),
        }
    }

    fn remove_dir_all(&self, path: &Path) -> FsResult<bool> {
        match fs::remove_dir_all(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ShellError::fs(path, e)),
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> FsResult<()> {
        self.remove_file(to)?;
        if fs::rename(from, to).is_ok() {
            return Ok(());
        }
        // Cross-device moves (e.g. a toolchain scratch dir on tmpfs)
        fs::copy(from, to).map_err(|e| ShellError::fs(from, e))?;
        fs::remove_file(from).map_err(|e| ShellError::fs(from, e))
    }

    fn modified(&self, path: &Path) -> FsResult<SystemTime> {
        fs::metadata(path)
            .and_then(|metadata| metadata.modified())
            .map_err(|e| ShellError::fs(path, e))
    }

    fn walk_dirs(&self, root: &Path) -> FsResult<Vec<DirEntryInfo>> {
        let mut dirs = Vec::new();

        for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                ShellError::fs(path, e.into())
            })?;

            let file_type = entry.file_type();
            let is_symlink = file_type.is_symlink();
            // Symlinks are reported so callers can skip them; they are never descended
            if !file_type.is_dir() && !(is_symlink && entry.path().is_dir()) {
                continue;
            }

            dirs.push(DirEntryInfo {
                path: entry.path().to_path_buf(),
                name: entry.file_name().to_string_lossy().into_owned(),
                is_symlink,
            });
        }

        Ok(dirs)
    }
}
