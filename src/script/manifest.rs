/// Build manifest generation
///
/// Assembles the [`ManifestDescriptor`] for a script project and renders it as
/// a SwiftPM `Package.swift`. Generation is pure: the host platform is looked
/// up by the caller and passed in through [`ManifestOptions`].
use std::fmt::{self, Write as _};

use super::resolver::{DependencyDescriptor, PackageReference, ProductReference};

const TOOLS_VERSION: &str = "5.9";

/// Minimum OS version the toolchain must be told about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConstraint {
    pub os: String,
    pub version: String,
}

/// Extra target settings requested on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestOptions {
    pub platform: Option<PlatformConstraint>,
    pub experimental_features: Vec<String>,
    pub unsafe_flags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDescriptor {
    pub library_name: String,
    pub binary_name: String,
    pub platform: Option<PlatformConstraint>,
    pub dependencies: Vec<DependencyDescriptor>,
    pub enabled_experimental_features: Vec<String>,
    pub unsafe_compiler_flags: Vec<String>,
}

/// Build the manifest descriptor for one script
pub fn generate(
    dependencies: Vec<DependencyDescriptor>,
    library_name: &str,
    binary_name: &str,
    options: &ManifestOptions,
) -> ManifestDescriptor {
    ManifestDescriptor {
        library_name: library_name.to_string(),
        binary_name: binary_name.to_string(),
        platform: options.platform.clone(),
        dependencies,
        enabled_experimental_features: options.experimental_features.clone(),
        unsafe_compiler_flags: options
            .unsafe_flags
            .iter()
            .map(|flag| {
                if flag.starts_with('-') {
                    flag.clone()
                } else {
                    format!("-{}", flag)
                }
            })
            .collect(),
    }
}

/// The platform the toolchain needs spelled out, if any
///
/// Only macOS hosts need an explicit deployment target: the running OS's major version.
pub fn host_platform() -> Option<PlatformConstraint> {
    #[cfg(target_os = "macos")]
    {
        let output = std::process::Command::new("sw_vers")
            .arg("-productVersion")
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let version = String::from_utf8_lossy(&output.stdout);
        let major = version.trim().split('.').next()?.to_string();
        if major.is_empty() {
            return None;
        }
        Some(PlatformConstraint {
            os: "macOS".to_string(),
            version: major,
        })
    }

    #[cfg(not(target_os = "macos"))]
    {
        None
    }
}

impl ManifestDescriptor {
    pub fn has_target_settings(&self) -> bool {
        !self.enabled_experimental_features.is_empty() || !self.unsafe_compiler_flags.is_empty()
    }

    /// Render as `Package.swift`
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ManifestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "// swift-tools-version:{}", TOOLS_VERSION)?;
        writeln!(f, "import PackageDescription")?;
        writeln!(f)?;
        writeln!(f, "let package = Package(")?;
        write!(f, " name: {}", quoted(&self.library_name))?;
        if let Some(platform) = &self.platform {
            write!(
                f,
                ", platforms: [.{}({})]",
                platform.os,
                quoted(&platform.version)
            )?;
        }
        writeln!(f, ",")?;

        writeln!(f, " dependencies: [")?;
        let packages: Vec<String> = self
            .dependencies
            .iter()
            .map(|dep| format!("  {}", dep.package))
            .collect();
        write_list(f, &packages)?;
        writeln!(f, " ],")?;

        writeln!(f, " targets: [")?;
        writeln!(f, "  .executableTarget(")?;
        writeln!(f, "   name: {},", quoted(&self.binary_name))?;
        writeln!(f, "   dependencies: [")?;
        let products: Vec<String> = self
            .dependencies
            .iter()
            .map(|dep| format!("    {}", dep.product))
            .collect();
        write_list(f, &products)?;
        writeln!(f, "   ],")?;
        write!(f, "   path: \".\"")?;

        if self.has_target_settings() {
            writeln!(f, ",")?;
            writeln!(f, "   swiftSettings: [")?;
            let mut settings: Vec<String> = self
                .enabled_experimental_features
                .iter()
                .map(|feature| format!("    .enableExperimentalFeature({})", quoted(feature)))
                .collect();
            if !self.unsafe_compiler_flags.is_empty() {
                let mut flags = String::from("    .unsafeFlags([\n");
                let quoted_flags: Vec<String> = self
                    .unsafe_compiler_flags
                    .iter()
                    .map(|flag| format!("     {}", quoted(flag)))
                    .collect();
                flags.push_str(&quoted_flags.join(",\n"));
                flags.push_str("\n    ])");
                settings.push(flags);
            }
            write_list(f, &settings)?;
            writeln!(f, "   ]")?;
        } else {
            writeln!(f)?;
        }

        writeln!(f, "  )")?;
        writeln!(f, " ]")?;
        writeln!(f, ")")
    }
}

impl fmt::Display for ProductReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(&quoted(name)),
            Self::Qualified { product, package } => write!(
                f,
                ".product(name: {}, package: {})",
                quoted(product),
                quoted(package)
            ),
        }
    }
}

impl fmt::Display for PackageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote { url, branch } => write!(
                f,
                ".package(url: {}, branch: {})",
                quoted(url),
                quoted(branch)
            ),
            Self::Local { path } => write!(
                f,
                ".package(path: {})",
                quoted(&path.to_string_lossy())
            ),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[String]) -> fmt::Result {
    if items.is_empty() {
        return Ok(());
    }
    f.write_str(&items.join(",\n"))?;
    f.write_char('\n')
}

/// Swift string literal
fn quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}
