/// One invocation of swift-shell against one script
///
/// Runs identity computation, maintenance, the freshness check and at most
/// one rebuild, then reports what the caller should do next as an
/// [`Outcome`]. Nothing here execs, prints or exits.
use anyhow::{Context, Result};
use std::fmt;
use std::path::PathBuf;

use tracing::debug;

use super::annotations::AnnotationParser;
use super::builder::Builder;
use super::cache::{Bucket, CleanReport, CacheStore, Fingerprint, Maintenance};
use super::identity::ScriptIdentity;
use super::manifest::{self, ManifestDescriptor, ManifestOptions};
use super::orchestrator::BuildOrchestrator;
use super::resolver::DependencyResolver;
use crate::fs::FileSystem;
use crate::merger::{Action, RunConfig};

/// What the invocation resolved to
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Replace the process with the executable
    Execute {
        executable: PathBuf,
        arguments: Vec<String>,
    },
    /// Print the executable path
    Print { executable: PathBuf },
    /// Open the generated manifest
    Open { manifest: PathBuf },
    /// A maintenance command ran; nothing else to do
    Maintenance(MaintenanceReport),
}

/// Result of `clean` or `remove`
#[derive(Debug, Clone, PartialEq)]
pub enum MaintenanceReport {
    Cleaned {
        binary_name: String,
        /// `None` if there was no bucket
        report: Option<CleanReport>,
    },
    Removed {
        binary_name: String,
        removed: bool,
    },
}

impl fmt::Display for MaintenanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cleaned {
                binary_name,
                report: Some(report),
            } if !report.is_empty() => {
                for dir in &report.removed_dirs {
                    let name = dir
                        .file_name()
                        .map(|name| name.to_string_lossy())
                        .unwrap_or_default();
                    writeln!(f, "removed {} build folder from cache", name)?;
                }
                if let Some(executable) = &report.removed_executable {
                    writeln!(f, "removed {} from cache", executable)?;
                }
                write!(f, "cleaned {}", binary_name)
            }
            Self::Cleaned { binary_name, .. } => write!(f, "nothing to do for {}", binary_name),
            Self::Removed {
                binary_name,
                removed: true,
            } => write!(f, "removed {} from cache", binary_name),
            Self::Removed {
                binary_name,
                removed: false,
            } => write!(f, "nothing to remove for {}", binary_name),
        }
    }
}

pub struct Session<'a> {
    config: &'a RunConfig,
    fs: &'a dyn FileSystem,
    builder: &'a dyn Builder,
}

impl<'a> Session<'a> {
    pub fn new(config: &'a RunConfig, fs: &'a dyn FileSystem, builder: &'a dyn Builder) -> Self {
        Self {
            config,
            fs,
            builder,
        }
    }

    pub fn run(&self) -> Result<Outcome> {
        let config = self.config;

        let identity = ScriptIdentity::compute(self.fs, &config.script)
            .with_context(|| format!("Failed to resolve script {}", config.script.display()))?;
        debug!(
            script = %identity.path.display(),
            identity = %identity.hex,
            "computed script identity"
        );

        let store = CacheStore::new(self.fs, config.cache_dir.clone())
            .context("Failed to prepare cache directory")?;
        let bucket = store.bucket(&identity, config.mode);
        let _lock = store.lock(&bucket)?;

        match config.maintenance {
            Some(Maintenance::Remove) => {
                let removed = store.remove(&bucket)?;
                return Ok(Outcome::Maintenance(MaintenanceReport::Removed {
                    binary_name: identity.binary_name,
                    removed,
                }));
            }
            Some(Maintenance::Clean) => {
                let report = store.clean(&bucket)?;
                return Ok(Outcome::Maintenance(MaintenanceReport::Cleaned {
                    binary_name: identity.binary_name,
                    report,
                }));
            }
            Some(Maintenance::Update) => {
                store.invalidate(&bucket)?;
            }
            None => {}
        }

        let fingerprint = Fingerprint::of_script(self.fs, &identity.path)?;
        if store.check_freshness(&bucket, &fingerprint)?.is_hit() {
            return Ok(self.outcome(&bucket));
        }

        let (manifest, source) = self
            .prepare(&identity)
            .with_context(|| format!("Failed to parse {}", identity.path.display()))?;
        let orchestrator = BuildOrchestrator::new(self.fs, self.builder, &store);

        if config.action == Action::Open {
            orchestrator.write_project(&bucket, &manifest, &source)?;
            return Ok(self.outcome(&bucket));
        }

        orchestrator.rebuild(
            &bucket,
            &manifest,
            &source,
            config.toolchain.as_deref(),
            &fingerprint,
        )?;
        Ok(self.outcome(&bucket))
    }

    /// Parse the script and generate its manifest
    fn prepare(&self, identity: &ScriptIdentity) -> Result<(ManifestDescriptor, String)> {
        let text = self.fs.read_to_string(&identity.path)?;

        let resolver = DependencyResolver::new(self.fs, identity.script_dir());
        let parsed = AnnotationParser::new(&resolver, self.config.mode.is_testable()).parse(&text)?;
        debug!(dependencies = parsed.dependencies.len(), "parsed script");

        let options = ManifestOptions {
            platform: manifest::host_platform(),
            experimental_features: self.config.experimental_features.clone(),
            unsafe_flags: self.config.unsafe_flags.clone(),
        };
        let manifest = manifest::generate(
            parsed.dependencies,
            &identity.library_name,
            &identity.binary_name,
            &options,
        );
        Ok((manifest, parsed.source))
    }

    fn outcome(&self, bucket: &Bucket) -> Outcome {
        match self.config.action {
            Action::Open => Outcome::Open {
                manifest: bucket.manifest_path(),
            },
            Action::Print => Outcome::Print {
                executable: bucket.executable_path(),
            },
            Action::Execute => Outcome::Execute {
                executable: bucket.executable_path(),
                arguments: self.config.arguments.clone(),
            },
        }
    }
}
