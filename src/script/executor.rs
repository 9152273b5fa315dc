/// Script executor
///
/// Hands control to the built executable. On Unix the swift-shell process
/// image is replaced, so signals, stdio and the exit status belong to the
/// script from then on.
use anyhow::{anyhow, Result};
use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::error::ShellError;

/// Replace the current process with `executable`
///
/// Only returns on failure. Where the platform can't replace the process
/// image the executable runs as a child and its exit code becomes ours.
pub fn replace_process(executable: &Path, arguments: &[String]) -> anyhow::Error {
    debug!(
        executable = %executable.display(),
        arguments = arguments.len(),
        "executing script"
    );

    let mut cmd = Command::new(executable);
    cmd.args(arguments);

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        let err = cmd.exec();
        ShellError::fs(executable, err).into()
    }

    #[cfg(not(unix))]
    {
        match cmd.status() {
            Ok(status) => std::process::exit(status.code().unwrap_or(1)),
            Err(e) => ShellError::fs(executable, e).into(),
        }
    }
}

/// Open the generated `Package.swift` with the host's default handler
pub fn open_manifest(manifest: &Path) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        let status = Command::new("open")
            .arg(manifest)
            .status()
            .map_err(|e| ShellError::fs(manifest, e))?;
        if !status.success() {
            return Err(anyhow!("unable to open {}", manifest.display()));
        }
        Ok(())
    }

    #[cfg(not(target_os = "macos"))]
    {
        debug!(manifest = %manifest.display(), "no opener on this host");
        Err(anyhow!("unable to open package on this operating system"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::exit_code_for;

    #[test]
    fn test_missing_executable_reports_path() {
        let temp = tempfile::TempDir::new().unwrap();
        let missing = temp.path().join("hello");

        let err = replace_process(&missing, &[]);

        assert_eq!(exit_code_for(&err), 1);
        assert!(err.to_string().contains("hello"));
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_open_unsupported_off_macos() {
        let err = open_manifest(Path::new("/tmp/Package.swift")).unwrap_err();
        assert!(err.to_string().contains("unable to open package"));
    }
}
