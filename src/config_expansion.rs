use anyhow::Result;
use std::env;

/// Expands environment variables in a path or settings string
///
/// Supports:
/// - `${VAR}` - Required variable (error if not set)
/// - `${VAR:-default}` - Optional variable with default value
/// - `$VAR` - Required variable, name runs over `[A-Za-z0-9_]`
/// - `$$` - Literal dollar sign (escaped)
/// - `~` or `~/...` at the very start - the user's home directory
///
/// # Examples
///
/// ```
/// # std::env::set_var("PACKAGES", "/opt/packages");
/// let path = swift_shell::config_expansion::expand_env_vars("$PACKAGES/shell").unwrap();
/// assert_eq!(path, "/opt/packages/shell");
///
/// let path = swift_shell::config_expansion::expand_env_vars("${MISSING_ROOT:-..}/paths").unwrap();
/// assert_eq!(path, "../paths");
/// ```
pub fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());

    let rest = match expand_home(content)? {
        Some((home, rest)) => {
            result.push_str(&home);
            rest
        }
        None => content,
    };

    let mut chars = rest.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        match chars.peek() {
            Some('$') => {
                chars.next();
                result.push('$');
            }
            Some('{') => {
                chars.next();

                let mut var_expr = String::new();
                let mut depth = 1;
                for ch in chars.by_ref() {
                    match ch {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    var_expr.push(ch);
                }

                let (var_name, default_value) = match var_expr.find(":-") {
                    Some(idx) => (&var_expr[..idx], Some(&var_expr[idx + 2..])),
                    None => (var_expr.as_str(), None),
                };

                result.push_str(&lookup(var_name, default_value)?);
            }
            Some(ch) if is_name_char(*ch) => {
                let mut var_name = String::new();
                while let Some(ch) = chars.peek() {
                    if !is_name_char(*ch) {
                        break;
                    }
                    var_name.push(*ch);
                    chars.next();
                }
                result.push_str(&lookup(&var_name, None)?);
            }
            // Just a literal $
            _ => result.push('$'),
        }
    }

    Ok(result)
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn lookup(name: &str, default_value: Option<&str>) -> Result<String> {
    match (env::var(name), default_value) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(default)) => Ok(default.to_string()),
        (Err(_), None) => anyhow::bail!(
            "Environment variable '{}' is required but not set. \
             Use ${{{}:-default}} to provide a default value.",
            name,
            name
        ),
    }
}

/// Split off a leading `~` / `~/`, returning the home directory and the remainder
fn expand_home(content: &str) -> Result<Option<(String, &str)>> {
    let Some(rest) = content.strip_prefix('~') else {
        return Ok(None);
    };
    if !(rest.is_empty() || rest.starts_with('/')) {
        // `~user` forms are left alone
        return Ok(None);
    }

    let home = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Cannot expand '~': home directory is unknown"))?;
    Ok(Some((home.to_string_lossy().into_owned(), rest)))
}
