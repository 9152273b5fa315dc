/// Builder collaborator
///
/// The toolchain that turns a project directory into an executable. The
/// default implementation drives `swift build`; tests substitute their own.
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output, Stdio};

use tracing::{debug, error, info};

use crate::error::ShellError;

/// Optimisation profile for a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    /// Optimised, the default
    #[default]
    Release,
    /// Unoptimised; permits `@testable import`
    Testable,
}

impl BuildMode {
    pub fn from_testable(testable: bool) -> Self {
        if testable {
            Self::Testable
        } else {
            Self::Release
        }
    }

    pub fn is_testable(self) -> bool {
        self == Self::Testable
    }

    /// Name of the toolchain's intermediate directory for this mode
    pub fn intermediate_dir(self) -> &'static str {
        match self {
            Self::Release => "release",
            Self::Testable => "debug",
        }
    }

    pub fn executable_suffix(self) -> &'static str {
        match self {
            Self::Release => "",
            Self::Testable => "-testable",
        }
    }
}

/// What to build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub product: String,
    pub mode: BuildMode,
    pub toolchain: Option<String>,
}

impl BuildRequest {
    /// Arguments passed to `swift`
    pub fn arguments(&self) -> Vec<String> {
        let mut args = vec![
            "build".to_string(),
            "--product".to_string(),
            self.product.clone(),
        ];

        if self.mode == BuildMode::Release {
            args.extend(
                ["-c", "release", "-Xcc", "-Ofast", "-Xswiftc", "-O"]
                    .iter()
                    .map(|s| s.to_string()),
            );
        }

        if let Some(toolchain) = &self.toolchain {
            args.push("--toolchain".to_string());
            args.push(toolchain.clone());
        }

        args
    }
}

pub trait Builder {
    /// Build the project; a non-zero toolchain exit is [`ShellError::BuilderInvocation`]
    fn build(&self, project_dir: &Path, request: &BuildRequest) -> Result<(), ShellError>;

    /// Directory the toolchain places built products in
    fn bin_path(&self, project_dir: &Path, request: &BuildRequest) -> Result<PathBuf, ShellError>;
}

/// [`Builder`] backed by the `swift` executable
#[derive(Debug, Clone)]
pub struct SwiftBuilder {
    swift: PathBuf,
    silent: bool,
}

impl SwiftBuilder {
    pub fn new(swift: PathBuf, silent: bool) -> Self {
        Self { swift, silent }
    }

    /// Use `explicit` if given, otherwise find `swift` on `PATH`
    pub fn locate(explicit: Option<PathBuf>, silent: bool) -> Self {
        let swift = explicit.unwrap_or_else(|| {
            which::which("swift").unwrap_or_else(|e| {
                debug!("Could not find 'swift' in PATH: {}. Trying as-is.", e);
                PathBuf::from("swift")
            })
        });
        Self::new(swift, silent)
    }

    fn command(&self, project_dir: &Path, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.swift);
        cmd.args(args).current_dir(project_dir).stdin(Stdio::null());
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> ShellError {
        if e.kind() == std::io::ErrorKind::NotFound {
            error!(swift = %self.swift.display(), "swift toolchain not found");
            ShellError::BuilderInvocation { status: 127 }
        } else {
            ShellError::fs(&self.swift, e)
        }
    }
}

impl Builder for SwiftBuilder {
    fn build(&self, project_dir: &Path, request: &BuildRequest) -> Result<(), ShellError> {
        let args = request.arguments();
        info!(
            operation = "build",
            product = %request.product,
            project = %project_dir.display(),
            "swift {}",
            args.join(" ")
        );

        let mut cmd = self.command(project_dir, &args);

        let status = if self.silent {
            let output = cmd.output().map_err(|e| self.spawn_error(e))?;
            if !output.status.success() {
                replay_output(&output);
            }
            output.status
        } else {
            // Toolchain chatter goes to stderr so stdout stays the script's
            cmd.stdout(std::io::stderr())
                .status()
                .map_err(|e| self.spawn_error(e))?
        };

        if status.success() {
            Ok(())
        } else {
            Err(ShellError::BuilderInvocation {
                status: status_code(status),
            })
        }
    }

    fn bin_path(&self, project_dir: &Path, request: &BuildRequest) -> Result<PathBuf, ShellError> {
        let mut args = request.arguments();
        args.push("--show-bin-path".to_string());

        let output = self
            .command(project_dir, &args)
            .output()
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            replay_output(&output);
            return Err(ShellError::BuilderInvocation {
                status: status_code(output.status),
            });
        }

        let path = String::from_utf8_lossy(&output.stdout);
        let path = path.lines().last().unwrap_or_default().trim();
        debug!(bin_path = path, "toolchain bin path");
        Ok(PathBuf::from(path))
    }
}

/// Write captured toolchain output to stderr
fn replay_output(output: &Output) {
    let mut stderr = std::io::stderr().lock();
    let _ = stderr.write_all(&output.stdout);
    let _ = stderr.write_all(&output.stderr);
}

fn status_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
