/// Script cache buckets
///
/// Every script gets one bucket directory under the cache root, named
/// `{binaryName}-{identityHex}`:
///
/// ```text
/// <cache_root>/
/// +-- .locks/<bucket>.lock
/// +-- hello-3f2a.../
///     +-- Package.swift     generated manifest
///     +-- main.swift        rewritten script source
///     +-- .modified         script mtime at the last successful release build
///     +-- .digest           script content hash at the last successful release build
///     +-- .modified-testable, .digest-testable  the same for testable builds
///     +-- .build/           toolchain intermediates
///     +-- hello             executable (hello-testable in testable mode)
/// ```
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use fs4::FileExt;
use tracing::{debug, info, warn};

use super::builder::BuildMode;
use super::identity::ScriptIdentity;
use crate::error::ShellError;
use crate::fs::FileSystem;

pub const MANIFEST_FILE: &str = "Package.swift";
pub const SOURCE_FILE: &str = "main.swift";
pub const FINGERPRINT_FILE: &str = ".modified";
pub const DIGEST_FILE: &str = ".digest";
pub const BUILD_DIR: &str = ".build";
const LOCKS_DIR: &str = ".locks";

/// A script's state at the time of a build
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint {
    /// Modification time, seconds since the Unix epoch
    pub modified: f64,
    /// Hex SHA-256 of the script contents
    pub digest: Option<String>,
}

impl Fingerprint {
    /// Read the current fingerprint of `script`
    pub fn of_script(fs: &dyn FileSystem, script: &Path) -> Result<Self, ShellError> {
        let modified = timestamp(fs.modified(script)?);
        let digest = hex::encode(Sha256::digest(fs.read(script)?));
        Ok(Self {
            modified,
            digest: Some(digest),
        })
    }

    /// A fingerprint no script can match
    pub fn now() -> Self {
        Self {
            modified: timestamp(SystemTime::now()),
            digest: None,
        }
    }
}

/// Seconds since the Unix epoch, with sub-second precision
pub fn timestamp(time: SystemTime) -> f64 {
    let time: DateTime<Utc> = time.into();
    time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) / 1e9
}

/// Why a bucket can't be reused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    NoBucket,
    NoManifest,
    NoExecutable,
    NoFingerprint,
    Modified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Hit,
    Miss(MissReason),
}

impl Freshness {
    pub fn is_hit(self) -> bool {
        self == Self::Hit
    }
}

/// One script's cache directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub name: String,
    pub dir: PathBuf,
    pub executable: String,
    pub mode: BuildMode,
}

impl Bucket {
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    pub fn source_path(&self) -> PathBuf {
        self.dir.join(SOURCE_FILE)
    }

    pub fn executable_path(&self) -> PathBuf {
        self.dir.join(&self.executable)
    }

    /// Each mode keeps its own fingerprint, next to its own executable
    fn fingerprint_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}{}", FINGERPRINT_FILE, self.mode.executable_suffix()))
    }

    fn digest_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}{}", DIGEST_FILE, self.mode.executable_suffix()))
    }
}

/// Cache maintenance requested on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Maintenance {
    /// Drop build intermediates and the executable, keep the project
    Clean,
    /// Delete the whole bucket
    Remove,
    /// Invalidate the fingerprint so this run rebuilds
    Update,
}

impl Maintenance {
    /// Combine the maintenance flags
    ///
    /// `remove` wins over everything. `clean` together with `update` also means
    /// `Remove`: a fresh rebuild from nothing is the only thing that satisfies
    /// both.
    pub fn from_flags(clean: bool, remove: bool, update: bool) -> Option<Self> {
        match (clean, remove, update) {
            (_, true, _) => Some(Self::Remove),
            (true, false, true) => {
                warn!("--clean with --update removes the whole cached project");
                Some(Self::Remove)
            }
            (true, false, false) => Some(Self::Clean),
            (false, false, true) => Some(Self::Update),
            (false, false, false) => None,
        }
    }

    /// Whether the run ends once the maintenance is done
    pub fn terminates(self) -> bool {
        !matches!(self, Self::Update)
    }
}

/// What `clean` deleted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub removed_dirs: Vec<PathBuf>,
    pub removed_executable: Option<String>,
}

impl CleanReport {
    pub fn is_empty(&self) -> bool {
        self.removed_dirs.is_empty() && self.removed_executable.is_none()
    }
}

/// Exclusive hold on one bucket, released on drop
#[derive(Debug)]
pub struct BucketLock {
    _file: File,
    path: PathBuf,
}

impl Drop for BucketLock {
    fn drop(&mut self) {
        debug!(lock = %self.path.display(), "released bucket lock");
    }
}

/// Maps script identities to bucket directories under one cache root
pub struct CacheStore<'a> {
    fs: &'a dyn FileSystem,
    root: PathBuf,
}

impl<'a> CacheStore<'a> {
    pub fn new(fs: &'a dyn FileSystem, root: PathBuf) -> Result<Self, ShellError> {
        fs.create_dir_all(&root)?;
        Ok(Self { fs, root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bucket(&self, identity: &ScriptIdentity, mode: BuildMode) -> Bucket {
        let name = identity.bucket_name();
        Bucket {
            dir: self.root.join(&name),
            executable: identity.executable_name(mode),
            name,
            mode,
        }
    }

    /// Block until no other invocation is using `bucket`
    pub fn lock(&self, bucket: &Bucket) -> Result<BucketLock, ShellError> {
        let locks = self.root.join(LOCKS_DIR);
        self.fs.create_dir_all(&locks)?;

        let path = locks.join(format!("{}.lock", bucket.name));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| ShellError::fs(&path, e))?;
        file.lock_exclusive()
            .map_err(|e| ShellError::fs(&path, e))?;

        debug!(lock = %path.display(), "acquired bucket lock");
        Ok(BucketLock { _file: file, path })
    }

    /// Decide whether the bucket's executable can be reused for `current`
    ///
    /// A hit needs the manifest, the executable and a stored fingerprint that
    /// matches: either the exact same mtime, or the same content digest when
    /// the file was touched without being changed.
    pub fn check_freshness(
        &self,
        bucket: &Bucket,
        current: &Fingerprint,
    ) -> Result<Freshness, ShellError> {
        let freshness = self.freshness(bucket, current)?;
        match freshness {
            Freshness::Hit => info!(operation = "freshness", status = "hit", bucket = %bucket.name, "cache hit"),
            Freshness::Miss(reason) => info!(
                operation = "freshness",
                status = "miss",
                bucket = %bucket.name,
                reason = ?reason,
                "cache miss"
            ),
        }
        Ok(freshness)
    }

    fn freshness(&self, bucket: &Bucket, current: &Fingerprint) -> Result<Freshness, ShellError> {
        if !self.fs.is_dir(&bucket.dir) {
            return Ok(Freshness::Miss(MissReason::NoBucket));
        }
        if !self.fs.is_file(&bucket.manifest_path()) {
            return Ok(Freshness::Miss(MissReason::NoManifest));
        }
        if !self.fs.is_file(&bucket.executable_path()) {
            return Ok(Freshness::Miss(MissReason::NoExecutable));
        }

        let Some(stored) = self.read_fingerprint(bucket)? else {
            return Ok(Freshness::Miss(MissReason::NoFingerprint));
        };

        if stored.modified.to_bits() == current.modified.to_bits() {
            return Ok(Freshness::Hit);
        }

        match (&stored.digest, &current.digest) {
            (Some(stored_digest), Some(current_digest)) if stored_digest == current_digest => {
                debug!(bucket = %bucket.name, "mtime changed but content did not");
                self.commit(bucket, current)?;
                Ok(Freshness::Hit)
            }
            _ => Ok(Freshness::Miss(MissReason::Modified)),
        }
    }

    fn read_fingerprint(&self, bucket: &Bucket) -> Result<Option<Fingerprint>, ShellError> {
        let path = bucket.fingerprint_path();
        if !self.fs.is_file(&path) {
            return Ok(None);
        }

        let Ok(modified) = self.fs.read_to_string(&path)?.trim().parse::<f64>() else {
            warn!(path = %path.display(), "unparsable fingerprint");
            return Ok(None);
        };

        let digest_path = bucket.digest_path();
        let digest = if self.fs.is_file(&digest_path) {
            Some(self.fs.read_to_string(&digest_path)?.trim().to_string())
        } else {
            None
        };

        Ok(Some(Fingerprint { modified, digest }))
    }

    /// Record `fingerprint` as the state of the last successful build
    pub fn commit(&self, bucket: &Bucket, fingerprint: &Fingerprint) -> Result<(), ShellError> {
        self.fs.create_dir_all(&bucket.dir)?;
        self.fs.write(
            &bucket.fingerprint_path(),
            fingerprint.modified.to_string().as_bytes(),
        )?;

        match &fingerprint.digest {
            Some(digest) => self.fs.write(&bucket.digest_path(), digest.as_bytes())?,
            None => {
                self.fs.remove_file(&bucket.digest_path())?;
            }
        }

        debug!(bucket = %bucket.name, modified = fingerprint.modified, "committed fingerprint");
        Ok(())
    }

    /// Force the next freshness check to fail. `false` if there is no bucket.
    pub fn invalidate(&self, bucket: &Bucket) -> Result<bool, ShellError> {
        if !self.fs.is_dir(&bucket.dir) {
            return Ok(false);
        }
        self.commit(bucket, &Fingerprint::now())?;
        info!(operation = "update", bucket = %bucket.name, "invalidated cached build");
        Ok(true)
    }

    /// Delete this mode's build intermediates and the executable
    ///
    /// Returns `None` when the bucket does not exist.
    pub fn clean(&self, bucket: &Bucket) -> Result<Option<CleanReport>, ShellError> {
        if !self.fs.is_dir(&bucket.dir) {
            return Ok(None);
        }

        self.invalidate(bucket)?;

        let mut report = CleanReport::default();
        let build_dir = bucket.dir.join(BUILD_DIR);

        if self.fs.is_dir(&build_dir) {
            let mut targets: Vec<PathBuf> = self
                .fs
                .walk_dirs(&build_dir)?
                .into_iter()
                .filter(|dir| !dir.is_symlink && dir.name == bucket.mode.intermediate_dir())
                .map(|dir| dir.path)
                .collect();
            targets.sort();
            targets.dedup();

            for target in targets {
                if report.removed_dirs.iter().any(|removed| target.starts_with(removed)) {
                    continue;
                }
                match self.fs.remove_dir_all(&target) {
                    Ok(true) => report.removed_dirs.push(target),
                    Ok(false) => {}
                    Err(e) => warn!(path = %target.display(), error = %e, "could not remove build folder"),
                }
            }
        }

        if self.fs.remove_file(&bucket.executable_path())? {
            report.removed_executable = Some(bucket.executable.clone());
        }

        info!(
            operation = "clean",
            bucket = %bucket.name,
            removed_dirs = report.removed_dirs.len(),
            removed_executable = report.removed_executable.is_some(),
            "cleaned bucket"
        );
        Ok(Some(report))
    }

    /// Delete the whole bucket. `false` if there was nothing to delete.
    pub fn remove(&self, bucket: &Bucket) -> Result<bool, ShellError> {
        let removed = self.fs.remove_dir_all(&bucket.dir)?;
        if removed {
            info!(operation = "remove", bucket = %bucket.name, "removed bucket");
        }
        Ok(removed)
    }

    /// Delete a stale executable so it can't pass a later freshness check
    pub fn discard_executable(&self, bucket: &Bucket) -> Result<bool, ShellError> {
        let removed = self.fs.remove_file(&bucket.executable_path())?;
        if removed {
            debug!(bucket = %bucket.name, executable = %bucket.executable, "discarded stale executable");
        }
        Ok(removed)
    }
}
