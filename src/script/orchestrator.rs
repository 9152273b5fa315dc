/// Build orchestration
///
/// Writes a script project into its bucket, drives the [`Builder`] and moves
/// the produced binary into place.
use std::path::PathBuf;

use tracing::{debug, info, warn};

use super::builder::{BuildRequest, Builder};
use super::cache::{Bucket, CacheStore, Fingerprint};
use super::manifest::ManifestDescriptor;
use crate::error::ShellError;
use crate::fs::FileSystem;

pub struct BuildOrchestrator<'a> {
    fs: &'a dyn FileSystem,
    builder: &'a dyn Builder,
    store: &'a CacheStore<'a>,
}

impl<'a> BuildOrchestrator<'a> {
    pub fn new(fs: &'a dyn FileSystem, builder: &'a dyn Builder, store: &'a CacheStore<'a>) -> Self {
        Self { fs, builder, store }
    }

    /// Write `Package.swift` and `main.swift` into the bucket
    pub fn write_project(
        &self,
        bucket: &Bucket,
        manifest: &ManifestDescriptor,
        source: &str,
    ) -> Result<(), ShellError> {
        self.fs.create_dir_all(&bucket.dir)?;
        self.fs
            .write(&bucket.manifest_path(), manifest.render().as_bytes())?;
        self.fs.write(&bucket.source_path(), source.as_bytes())?;
        debug!(bucket = %bucket.name, "wrote project");
        Ok(())
    }

    /// Build the bucket's project and commit `fingerprint` on success
    ///
    /// Any failure leaves the bucket without an executable, so a later run
    /// can't mistake a stale binary for a fresh one.
    pub fn rebuild(
        &self,
        bucket: &Bucket,
        manifest: &ManifestDescriptor,
        source: &str,
        toolchain: Option<&str>,
        fingerprint: &Fingerprint,
    ) -> Result<PathBuf, ShellError> {
        self.write_project(bucket, manifest, source)?;

        let request = BuildRequest {
            product: manifest.binary_name.clone(),
            mode: bucket.mode,
            toolchain: toolchain.map(str::to_string),
        };

        let executable = match self.build_and_install(bucket, &request) {
            Ok(executable) => executable,
            Err(e) => {
                if let Err(cleanup) = self.store.discard_executable(bucket) {
                    warn!(bucket = %bucket.name, error = %cleanup, "could not discard stale executable");
                }
                return Err(e);
            }
        };

        self.store.commit(bucket, fingerprint)?;
        info!(
            operation = "rebuild",
            status = "success",
            bucket = %bucket.name,
            executable = %executable.display(),
            "built script"
        );
        Ok(executable)
    }

    fn build_and_install(&self, bucket: &Bucket, request: &BuildRequest) -> Result<PathBuf, ShellError> {
        self.builder.build(&bucket.dir, request)?;

        let bin_dir = self.builder.bin_path(&bucket.dir, request)?;
        let bin_dir = if bin_dir.is_relative() {
            bucket.dir.join(bin_dir)
        } else {
            bin_dir
        };

        let produced = bin_dir.join(&request.product);
        if !self.fs.is_file(&produced) {
            warn!(path = %produced.display(), "builder reported success but produced no binary");
            return Err(ShellError::BuilderInvocation { status: 1 });
        }

        let executable = bucket.executable_path();
        self.fs.remove_file(&executable)?;
        self.fs.rename(&produced, &executable)?;
        Ok(executable)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fs::LocalFileSystem;
    use crate::script::builder::BuildMode;
    use crate::script::identity::ScriptIdentity;
    use crate::script::manifest::{generate, ManifestOptions};
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Builder that writes a fake binary into `<project>/.build/<mode>/`
    pub(crate) struct RecordingBuilder {
        pub requests: RefCell<Vec<BuildRequest>>,
        pub fail_with: Option<i32>,
        pub produce: bool,
    }

    impl RecordingBuilder {
        pub fn new() -> Self {
            Self {
                requests: RefCell::new(Vec::new()),
                fail_with: None,
                produce: true,
            }
        }

        pub fn failing(status: i32) -> Self {
            Self {
                fail_with: Some(status),
                ..Self::new()
            }
        }

        pub fn builds(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    impl Builder for RecordingBuilder {
        fn build(&self, project_dir: &Path, request: &BuildRequest) -> Result<(), ShellError> {
            self.requests.borrow_mut().push(request.clone());
            assert!(project_dir.join("Package.swift").is_file());
            assert!(project_dir.join("main.swift").is_file());

            if let Some(status) = self.fail_with {
                return Err(ShellError::BuilderInvocation { status });
            }
            if self.produce {
                let out = self.bin_path(project_dir, request)?;
                fs::create_dir_all(&out).unwrap();
                fs::write(out.join(&request.product), "#!/bin/sh\n").unwrap();
            }
            Ok(())
        }

        fn bin_path(&self, project_dir: &Path, request: &BuildRequest) -> Result<PathBuf, ShellError> {
            Ok(project_dir
                .join(".build")
                .join(request.mode.intermediate_dir()))
        }
    }

    fn fixture(temp: &TempDir, mode: BuildMode) -> (CacheStore<'static>, Bucket, ManifestDescriptor) {
        let store = CacheStore::new(&LocalFileSystem, temp.path().join("cache")).unwrap();
        let identity = ScriptIdentity::from_canonical(temp.path().join("hello.swift"));
        let bucket = store.bucket(&identity, mode);
        let manifest = generate(vec![], &identity.library_name, &identity.binary_name, &ManifestOptions::default());
        (store, bucket, manifest)
    }

    fn fingerprint() -> Fingerprint {
        Fingerprint {
            modified: 1700000000.5,
            digest: Some("abc".to_string()),
        }
    }

    #[test]
    fn test_rebuild_installs_executable_and_commits() {
        let temp = TempDir::new().unwrap();
        let (store, bucket, manifest) = fixture(&temp, BuildMode::Testable);
        let builder = RecordingBuilder::new();
        let orchestrator = BuildOrchestrator::new(&LocalFileSystem, &builder, &store);

        let executable = orchestrator
            .rebuild(&bucket, &manifest, "print(1)", Some("swift-6"), &fingerprint())
            .unwrap();

        assert_eq!(executable, bucket.dir.join("hello-testable"));
        assert!(executable.is_file());
        assert!(!bucket.dir.join(".build/debug/hello").exists());
        assert_eq!(fs::read_to_string(bucket.source_path()).unwrap(), "print(1)");
        assert!(store.check_freshness(&bucket, &fingerprint()).unwrap().is_hit());

        let requests = builder.requests.borrow();
        assert_eq!(requests[0].product, "hello");
        assert_eq!(requests[0].mode, BuildMode::Testable);
        assert_eq!(requests[0].toolchain.as_deref(), Some("swift-6"));
    }

    #[test]
    fn test_failed_build_discards_stale_executable() {
        let temp = TempDir::new().unwrap();
        let (store, bucket, manifest) = fixture(&temp, BuildMode::Release);
        fs::create_dir_all(&bucket.dir).unwrap();
        fs::write(bucket.executable_path(), "stale").unwrap();

        let builder = RecordingBuilder::failing(65);
        let orchestrator = BuildOrchestrator::new(&LocalFileSystem, &builder, &store);

        let err = orchestrator
            .rebuild(&bucket, &manifest, "print(1)", None, &fingerprint())
            .unwrap_err();

        assert!(matches!(err, ShellError::BuilderInvocation { status: 65 }));
        assert!(!bucket.executable_path().exists());
        assert!(!bucket.dir.join(".modified").exists());
    }

    #[test]
    fn test_missing_binary_is_build_failure() {
        let temp = TempDir::new().unwrap();
        let (store, bucket, manifest) = fixture(&temp, BuildMode::Release);
        let builder = RecordingBuilder {
            produce: false,
            ..RecordingBuilder::new()
        };
        let orchestrator = BuildOrchestrator::new(&LocalFileSystem, &builder, &store);

        let err = orchestrator
            .rebuild(&bucket, &manifest, "print(1)", None, &fingerprint())
            .unwrap_err();

        assert!(matches!(err, ShellError::BuilderInvocation { status: 1 }));
    }
}
