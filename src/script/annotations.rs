/// Dependency annotation parser
///
/// Scans a Swift script for import lines carrying a trailing dependency
/// comment, e.g.
///
/// ```text
/// import Shell // @git/acrlc/shell
/// import Paths // ../paths
/// ```
///
/// and rewrites the source with those comments stripped. The rewritten source
/// always has exactly as many lines as the input so compiler diagnostics
/// still point at the right line of the original script.
use tracing::debug;

use super::resolver::{DependencyDescriptor, DependencyResolver};
use crate::error::ShellError;

/// Placeholder that replaces a `#!` interpreter line
const SHEBANG_REPLACEMENT: &str = "//";

/// The import forms that may carry a dependency annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Plain,
    Testable,
    Exported,
}

impl ImportKind {
    const PREFIXES: [(&'static str, ImportKind); 3] = [
        ("@testable", ImportKind::Testable),
        ("@_exported", ImportKind::Exported),
        ("", ImportKind::Plain),
    ];
}

/// An import statement found on a line, plus where its trailing comment starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierLine<'a> {
    pub kind: ImportKind,
    pub module: &'a str,
    /// Byte offset of the `//` marker, if the line has a trailing comment
    pub comment_start: Option<usize>,
}

impl<'a> CarrierLine<'a> {
    /// Classify a line; `None` if it is not an import statement
    pub fn scan(line: &'a str) -> Option<Self> {
        let comment_start = find_line_comment(line);
        let statement = match comment_start {
            Some(idx) => &line[..idx],
            None => line,
        };
        let statement = statement.trim();

        let (kind, rest) = ImportKind::PREFIXES.iter().find_map(|(prefix, kind)| {
            let rest = statement.strip_prefix(prefix)?;
            let rest = if prefix.is_empty() { rest } else { rest.trim_start() };
            strip_keyword(rest, "import").map(|rest| (*kind, rest))
        })?;

        // `import struct Foo.Bar` depends on module `Foo`
        let path = rest.split_whitespace().last()?;
        let module = path.split('.').next().unwrap_or(path);
        if module.is_empty() {
            return None;
        }

        Some(Self {
            kind,
            module,
            comment_start,
        })
    }

    /// Text after the `//` marker with leading whitespace removed
    pub fn annotation(&self, line: &'a str) -> Option<&'a str> {
        let body = line[self.comment_start? + 2..].trim();
        (!body.is_empty()).then_some(body)
    }
}

/// `keyword` followed by whitespace; returns the remainder
fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(keyword)?;
    rest.starts_with(char::is_whitespace).then_some(rest)
}

/// Byte offset of the first `//` that is not inside a string literal
pub fn find_line_comment(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
        } else if b == b'"' {
            in_string = true;
        } else if b == b'/' && bytes.get(i + 1) == Some(&b'/') {
            return Some(i);
        }
        i += 1;
    }

    None
}

/// Result of parsing a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedScript {
    /// Source with annotations stripped, line count preserved
    pub source: String,
    /// Dependencies in the order they were encountered
    pub dependencies: Vec<DependencyDescriptor>,
}

/// Extracts dependency annotations from script text
pub struct AnnotationParser<'a> {
    resolver: &'a DependencyResolver<'a>,
    testable: bool,
}

impl<'a> AnnotationParser<'a> {
    /// `testable` permits `@testable import` lines
    pub fn new(resolver: &'a DependencyResolver<'a>, testable: bool) -> Self {
        Self { resolver, testable }
    }

    pub fn parse(&self, text: &str) -> Result<ParsedScript, ShellError> {
        let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
        let mut dependencies = Vec::new();

        let mut first = 0;
        if lines.first().is_some_and(|line| line.starts_with("#!")) {
            lines[0] = SHEBANG_REPLACEMENT.to_string();
            first = 1;
        }

        for (index, line) in lines.iter_mut().enumerate().skip(first) {
            if line.is_empty() {
                continue;
            }

            let Some(carrier) = CarrierLine::scan(line) else {
                continue;
            };

            if carrier.kind == ImportKind::Testable && !self.testable {
                return Err(ShellError::TestableImportDisallowed {
                    module: carrier.module.to_string(),
                });
            }

            // A bare import needs no external package
            let Some(annotation) = carrier.annotation(line) else {
                continue;
            };

            let descriptor = self.resolver.resolve(carrier.module, annotation)?;
            if dependencies.contains(&descriptor) {
                debug!(
                    module = carrier.module,
                    line = index + 1,
                    "duplicate dependency annotation"
                );
            }

            let comment_start = carrier.comment_start.unwrap_or(line.len());
            dependencies.push(descriptor);
            line.truncate(comment_start);
        }

        Ok(ParsedScript {
            source: lines.join("\n"),
            dependencies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFileSystem;
    use crate::script::resolver::{PackageReference, ProductReference};
    use std::fs;
    use tempfile::TempDir;

    fn parse(text: &str, testable: bool) -> Result<ParsedScript, ShellError> {
        let resolver = DependencyResolver::new(&LocalFileSystem, "/tmp");
        AnnotationParser::new(&resolver, testable).parse(text)
    }

    #[test]
    fn test_scan_import_forms() {
        let plain = CarrierLine::scan("import Shell // @git/acrlc/shell").unwrap();
        assert_eq!(plain.kind, ImportKind::Plain);
        assert_eq!(plain.module, "Shell");
        assert_eq!(plain.comment_start, Some(13));

        let testable = CarrierLine::scan("@testable import Core").unwrap();
        assert_eq!(testable.kind, ImportKind::Testable);
        assert_eq!(testable.comment_start, None);

        let exported = CarrierLine::scan("  @_exported import Paths // ../paths").unwrap();
        assert_eq!(exported.kind, ImportKind::Exported);
        assert_eq!(exported.module, "Paths");

        let symbol = CarrierLine::scan("import struct Foundation.Data").unwrap();
        assert_eq!(symbol.module, "Foundation");
    }

    #[test]
    fn test_scan_rejects_non_imports() {
        assert!(CarrierLine::scan("let importer = 1").is_none());
        assert!(CarrierLine::scan("importShell").is_none());
        assert!(CarrierLine::scan("// import Shell").is_none());
        assert!(CarrierLine::scan("print(\"import Shell\")").is_none());
    }

    #[test]
    fn test_find_line_comment_skips_strings() {
        assert_eq!(find_line_comment("let url = \"https://x\""), None);
        assert_eq!(find_line_comment("let url = \"https://x\" // note"), Some(22));
        assert_eq!(find_line_comment("let s = \"\\\"//\" // c"), Some(15));
        assert_eq!(find_line_comment("a / b"), None);
    }

    #[test]
    fn test_line_count_is_preserved() {
        let text = "#!/usr/bin/env swift-shell\nimport Shell // @git/acrlc/shell\n\nprint(1)\n";
        let parsed = parse(text, false).unwrap();

        assert_eq!(parsed.source.split('\n').count(), text.split('\n').count());
        assert_eq!(parsed.source, "//\nimport Shell \n\nprint(1)\n");
    }

    #[test]
    fn test_shebang_only_on_first_line() {
        let parsed = parse("print(1)\n#!not a shebang", false).unwrap();
        assert_eq!(parsed.source, "print(1)\n#!not a shebang");
    }

    #[test]
    fn test_carrier_without_comment_is_untouched() {
        let text = "import Foundation\nimport Shell // @git/acrlc/shell";
        let parsed = parse(text, false).unwrap();

        assert_eq!(parsed.source, "import Foundation\nimport Shell ");
        assert_eq!(parsed.dependencies.len(), 1);
    }

    #[test]
    fn test_empty_annotation_is_a_plain_comment() {
        let text = "import Shell //\nimport Core //   \nprint(1)";
        let parsed = parse(text, false).unwrap();

        assert!(parsed.dependencies.is_empty());
        assert_eq!(parsed.source, text);
    }

    #[test]
    fn test_dependencies_in_encounter_order() {
        let text = "import Shell // @git/acrlc/shell\n\
                    import Core // @git:develop/acrlc/core\n\
                    import Shell // @git/acrlc/shell";
        let parsed = parse(text, false).unwrap();

        assert_eq!(parsed.dependencies.len(), 3);
        assert_eq!(
            parsed.dependencies[1].package,
            PackageReference::Remote {
                url: "https://github.com/acrlc/core".to_string(),
                branch: "develop".to_string(),
            }
        );
        assert_eq!(parsed.dependencies[0], parsed.dependencies[2]);
    }

    #[test]
    fn test_testable_import_requires_flag() {
        let text = "@testable import Core // @git/acrlc/core";

        let err = parse(text, false).unwrap_err();
        assert!(matches!(
            err,
            ShellError::TestableImportDisallowed { ref module } if module == "Core"
        ));

        let parsed = parse(text, true).unwrap();
        assert_eq!(parsed.dependencies.len(), 1);
        assert_eq!(parsed.source, "@testable import Core ");
    }

    #[test]
    fn test_bare_testable_import_is_still_rejected() {
        assert!(parse("@testable import Core", false).is_err());
    }

    #[test]
    fn test_unresolvable_annotation_fails() {
        let err = parse("import Command // ../../command-missing", false).unwrap_err();
        assert!(matches!(err, ShellError::DependencyResolution { .. }));
    }

    #[test]
    fn test_ordinary_comments_are_ignored() {
        let text = "let x = 1 // @git/acrlc/shell\n// import Shell // @git/acrlc/shell";
        let parsed = parse(text, false).unwrap();

        assert_eq!(parsed.source, text);
        assert!(parsed.dependencies.is_empty());
    }

    #[test]
    fn test_local_annotation_relative_to_script() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("Paths")).unwrap();

        let resolver = DependencyResolver::new(&LocalFileSystem, temp.path());
        let parser = AnnotationParser::new(&resolver, false);
        let parsed = parser.parse("import Paths // ./Paths\r").unwrap();

        assert_eq!(parsed.source, "import Paths ");
        assert_eq!(
            parsed.dependencies[0].product,
            ProductReference::Named("Paths".to_string())
        );
    }
}
