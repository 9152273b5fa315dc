/// Dependency specifier resolution
///
/// Turns the body of a trailing `// ...` annotation on an import line into a
/// concrete package dependency. Two grammars are accepted:
///
/// - remote shorthand, `@domain[:branch]/org/.../repo`, e.g. `@git/acrlc/shell`
/// - a local directory path, resolved against the script's own directory
use std::path::PathBuf;

use tracing::debug;

use crate::config_expansion::expand_env_vars;
use crate::error::ShellError;
use crate::fs::FileSystem;

const DEFAULT_BRANCH: &str = "main";
const DEFAULT_DOMAIN: &str = "git";

/// How the executable target refers to the imported module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductReference {
    /// The module is the package's own name: `"Shell"`
    Named(String),
    /// The module lives in a differently named package
    Qualified { product: String, package: String },
}

/// Where the package comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageReference {
    Remote { url: String, branch: String },
    Local { path: PathBuf },
}

/// A resolved `(product, package)` pair for one import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDescriptor {
    pub product: ProductReference,
    pub package: PackageReference,
}

impl DependencyDescriptor {
    fn new(module: &str, package_name: &str, package: PackageReference) -> Self {
        // Case-sensitive: `Shell` from package `shell` is qualified
        let product = if module == package_name {
            ProductReference::Named(module.to_string())
        } else {
            ProductReference::Qualified {
                product: module.to_string(),
                package: package_name.to_string(),
            }
        };

        Self { product, package }
    }
}

/// Parsed `@domain:branch/org/repo` shorthand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSource {
    pub url: String,
    pub branch: String,
    pub package_name: String,
}

/// Parse the remote shorthand grammar (`spec` includes the leading `@`)
///
/// The first segment is `domain` or `domain:branch`. When a branch is given,
/// every segment beyond the final two is folded into it, so `feature/x` style
/// branch names work: `@git:feature/x/acrlc/shell`.
pub fn parse_remote(spec: &str) -> Result<RemoteSource, String> {
    let body = spec.strip_prefix('@').unwrap_or(spec);

    if body.chars().any(char::is_whitespace) {
        return Err("malformed url: whitespace in remote source".to_string());
    }

    let mut segments: Vec<&str> = body.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Err("malformed url: empty remote source".to_string());
    }

    let prefix = segments.remove(0);

    let (domain, branch) = match prefix.matches(':').count() {
        0 => (prefix, DEFAULT_BRANCH.to_string()),
        1 => {
            let (domain, head) = prefix.split_once(':').unwrap_or((prefix, ""));
            if domain.is_empty() || head.is_empty() {
                return Err(format!(
                    "malformed url: invalid domain '{}', must follow the format <domain:branch>",
                    prefix
                ));
            }

            let mut branch = vec![head];
            while segments.len() > 2 {
                branch.push(segments.remove(0));
            }
            (domain, branch.join("/"))
        }
        _ => {
            return Err(format!(
                "malformed url: invalid domain '{}', must follow the format <domain:branch>",
                prefix
            ))
        }
    };

    if segments.len() < 2 {
        return Err(format!(
            "malformed url: expected <org>/<repo> after '{}'",
            prefix
        ));
    }

    let host = if domain == DEFAULT_DOMAIN {
        "github"
    } else {
        domain
    };
    let path = segments.join("/");
    let url = format!("https://{}.com/{}", host, path);

    let last = segments.last().copied().unwrap_or_default();
    let package_name = match last.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => last,
    };

    Ok(RemoteSource {
        url,
        branch,
        package_name: package_name.to_string(),
    })
}

/// Resolves annotation bodies relative to one script's directory
pub struct DependencyResolver<'a> {
    fs: &'a dyn FileSystem,
    base_dir: PathBuf,
}

impl<'a> DependencyResolver<'a> {
    /// `base_dir` is the directory containing the script; local paths are relative to it
    pub fn new(fs: &'a dyn FileSystem, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            base_dir: base_dir.into(),
        }
    }

    /// Resolve the annotation attached to `import <module>`
    pub fn resolve(
        &self,
        module: &str,
        annotation: &str,
    ) -> Result<DependencyDescriptor, ShellError> {
        let resolved = if annotation.starts_with('@') {
            parse_remote(annotation).map(|remote| {
                debug!(module, url = %remote.url, branch = %remote.branch, "resolved remote dependency");
                DependencyDescriptor::new(
                    module,
                    &remote.package_name,
                    PackageReference::Remote {
                        url: remote.url,
                        branch: remote.branch,
                    },
                )
            })
        } else {
            self.resolve_local(annotation).map(|(path, package_name)| {
                debug!(module, path = %path.display(), "resolved local dependency");
                DependencyDescriptor::new(module, &package_name, PackageReference::Local { path })
            })
        };

        resolved.map_err(|reason| ShellError::DependencyResolution {
            module: module.to_string(),
            source_text: annotation.to_string(),
            reason,
        })
    }

    fn resolve_local(&self, annotation: &str) -> Result<(PathBuf, String), String> {
        let expanded = expand_env_vars(annotation).map_err(|e| e.to_string())?;
        let candidate = self.base_dir.join(&expanded);

        if !self.fs.is_dir(&candidate) {
            return Err(format!("no such directory: {}", candidate.display()));
        }

        let path = self
            .fs
            .canonicalize(&candidate)
            .map_err(|e| e.to_string())?;

        let package_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| format!("cannot name package at {}", path.display()))?;

        Ok((path, package_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFileSystem;
    use std::fs;
    use tempfile::TempDir;

    fn remote(url: &str, branch: &str) -> PackageReference {
        PackageReference::Remote {
            url: url.to_string(),
            branch: branch.to_string(),
        }
    }

    #[test]
    fn test_remote_shorthand() {
        let resolver = DependencyResolver::new(&LocalFileSystem, "/tmp");
        let dep = resolver.resolve("Shell", "@git/acrlc/shell").unwrap();

        assert_eq!(dep.package, remote("https://github.com/acrlc/shell", "main"));
        assert_eq!(
            dep.product,
            ProductReference::Qualified {
                product: "Shell".to_string(),
                package: "shell".to_string(),
            }
        );
    }

    #[test]
    fn test_remote_shorthand_with_branch() {
        let source = parse_remote("@git:develop/acrlc/shell").unwrap();
        assert_eq!(source.url, "https://github.com/acrlc/shell");
        assert_eq!(source.branch, "develop");
        assert_eq!(source.package_name, "shell");
    }

    #[test]
    fn test_branch_with_slashes() {
        let source = parse_remote("@git:feature/parser/acrlc/shell").unwrap();
        assert_eq!(source.url, "https://github.com/acrlc/shell");
        assert_eq!(source.branch, "feature/parser");
    }

    #[test]
    fn test_custom_domain_keeps_nested_path() {
        let source = parse_remote("@gitlab/group/sub/tool").unwrap();
        assert_eq!(source.url, "https://gitlab.com/group/sub/tool");
        assert_eq!(source.branch, "main");
        assert_eq!(source.package_name, "tool");
    }

    #[test]
    fn test_package_name_strips_extension() {
        let source = parse_remote("@git/apple/swift-collections.git").unwrap();
        assert_eq!(source.url, "https://github.com/apple/swift-collections.git");
        assert_eq!(source.package_name, "swift-collections");
    }

    #[test]
    fn test_org_repo_without_domain_is_malformed() {
        let err = parse_remote("@acrlc/shell").unwrap_err();
        assert!(err.starts_with("malformed url"));

        let resolver = DependencyResolver::new(&LocalFileSystem, "/tmp");
        let err = resolver.resolve("Shell", "@acrlc/shell").unwrap_err();
        assert!(matches!(err, ShellError::DependencyResolution { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_malformed_remote() {
        assert!(parse_remote("@").is_err());
        assert!(parse_remote("@git").is_err());
        assert!(parse_remote("@git:dev/shell").is_err());
        assert!(parse_remote("@git:a:b/acrlc/shell").is_err());
        assert!(parse_remote("@:dev/acrlc/shell").is_err());
    }

    #[test]
    fn test_malformed_remote_reports_module() {
        let resolver = DependencyResolver::new(&LocalFileSystem, "/tmp");
        let err = resolver.resolve("Shell", "@git").unwrap_err();

        match err {
            ShellError::DependencyResolution {
                module,
                source_text,
                ..
            } => {
                assert_eq!(module, "Shell");
                assert_eq!(source_text, "@git");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_self_named_package_is_bare() {
        let resolver = DependencyResolver::new(&LocalFileSystem, "/tmp");
        let dep = resolver.resolve("Shell", "@git/acrlc/Shell").unwrap();
        assert_eq!(dep.product, ProductReference::Named("Shell".to_string()));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let resolver = DependencyResolver::new(&LocalFileSystem, "/tmp");
        let first = resolver.resolve("Shell", "@git:develop/acrlc/shell").unwrap();
        let second = resolver.resolve("Shell", "@git:develop/acrlc/shell").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_local_relative_to_script_dir() {
        let temp = TempDir::new().unwrap();
        let scripts = temp.path().join("scripts");
        fs::create_dir_all(&scripts).unwrap();
        fs::create_dir_all(temp.path().join("paths")).unwrap();

        let resolver = DependencyResolver::new(&LocalFileSystem, &scripts);
        let dep = resolver.resolve("Paths", "../paths").unwrap();

        let expected = fs::canonicalize(temp.path().join("paths")).unwrap();
        assert_eq!(dep.package, PackageReference::Local { path: expected });
        assert_eq!(
            dep.product,
            ProductReference::Qualified {
                product: "Paths".to_string(),
                package: "paths".to_string(),
            }
        );
    }

    #[test]
    fn test_local_missing_directory() {
        let temp = TempDir::new().unwrap();
        let resolver = DependencyResolver::new(&LocalFileSystem, temp.path());

        let err = resolver.resolve("Command", "../../command").unwrap_err();
        assert!(matches!(err, ShellError::DependencyResolution { .. }));
        assert!(err.to_string().contains("../../command"));
    }

    #[test]
    fn test_local_file_is_not_a_package() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("Shell"), "").unwrap();
        let resolver = DependencyResolver::new(&LocalFileSystem, temp.path());

        assert!(resolver.resolve("Shell", "Shell").is_err());
    }
}
