//! Error taxonomy for swift-shell
//!
//! Every fatal condition the tool can hit maps to one variant here, and every
//! variant knows the process exit code it terminates with. Plumbing code uses
//! `anyhow` and attaches context; `main` downcasts back to [`ShellError`] to
//! pick the exit status.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("missing parameters:\n\t[<option> or [-flags]] <filename> <arguments>")]
    MissingInput,

    #[error("unknown option: {0}")]
    UnknownFlag(String),

    #[error(
        "@testable import not allowed for {module}, not built for testing\n\
         \tplease use flag -t or --testable to enable"
    )]
    TestableImportDisallowed { module: String },

    #[error("{module}: missing package: {source_text} ({reason})")]
    DependencyResolution {
        module: String,
        source_text: String,
        reason: String,
    },

    #[error("build failed with status {status}")]
    BuilderInvocation { status: i32 },

    #[error("{}: {source}", path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ShellError {
    /// Wrap an I/O error with the path it happened on
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingInput => 2,
            Self::UnknownFlag(_) => 1,
            Self::TestableImportDisallowed { .. } => 2,
            Self::DependencyResolution { .. } => 2,
            // A zero status can't signal failure to the caller
            Self::BuilderInvocation { status } if *status != 0 => *status,
            Self::BuilderInvocation { .. } => 1,
            Self::FileSystem { .. } => 1,
            Self::Config(_) => 1,
        }
    }
}

/// Exit code for an arbitrary error chain
///
/// Looks through `anyhow` context layers for the first [`ShellError`].
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<ShellError>())
        .map(ShellError::exit_code)
        .unwrap_or(1)
}
