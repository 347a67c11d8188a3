//! Environment variable conventions
//!
//! Feature options travel as environment variables named
//! `<PREFIX><FEATURE_ID>_<OPTION_ID>`, with ids upper-cased and every
//! non-alphanumeric character replaced by `_`. The same convention is used
//! for user input (`BP_CONTAINER_FEATURE_`), for script input (`_BUILD_ARG_`)
//! and for selections a detect script writes back to its env file.
//!
//! Lookups go through [`EnvLookup`] so the resolver can run against an
//! in-memory map in tests and against the live process environment otherwise.

use crate::constants::OPTION_METADATA_KEY_PREFIX;
use crate::errors::{ConfigError, Result};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, instrument, warn};

static UNSAFE_ID_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9]").expect("Valid regex pattern"));

/// Read-only source of environment variables
pub trait EnvLookup {
    /// Value of `name`, or `None` when unset
    fn lookup(&self, name: &str) -> Option<String>;

    /// Value of `name` when set to something non-empty
    fn non_empty(&self, name: &str) -> Option<String> {
        self.lookup(name).filter(|v| !v.is_empty())
    }
}

/// The current process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn lookup(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvLookup for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl EnvLookup for IndexMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Upper-case an id and replace anything that is not `[A-Z0-9]` with `_`
pub fn env_safe_id(id: &str) -> String {
    UNSAFE_ID_CHARS
        .replace_all(&id.to_uppercase(), "_")
        .into_owned()
}

/// `<prefix><FEATURE>` or `<prefix><FEATURE>_<OPTION>`
pub fn option_env_var_name(prefix: &str, feature_id: &str, option_id: Option<&str>) -> String {
    match option_id {
        Some(option) if !option.is_empty() => format!(
            "{}{}_{}",
            prefix,
            env_safe_id(feature_id),
            env_safe_id(option)
        ),
        _ => format!("{}{}", prefix, env_safe_id(feature_id)),
    }
}

/// Plan metadata key carrying a selection for `option_id`, e.g. `option_install_tools`
pub fn option_metadata_key(option_id: &str) -> String {
    format!(
        "{}{}",
        OPTION_METADATA_KEY_PREFIX,
        env_safe_id(option_id).to_lowercase()
    )
}

/// Parse a dotenv-style file into an ordered map.
///
/// Blank lines and `#` comments are skipped, an `export ` prefix is allowed,
/// and values may be single- or double-quoted. Lines without `=` are ignored
/// with a warning.
#[instrument(level = "debug", fields(path = %path.display()))]
pub fn parse_env_file(path: &Path) -> Result<IndexMap<String, String>> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut vars = IndexMap::new();

    for (line_num, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line).trim_start();

        let Some((key, value)) = line.split_once('=') else {
            warn!(
                "Ignoring malformed line {}:{} (expected KEY=VALUE)",
                path.display(),
                line_num + 1
            );
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            warn!("Empty key at {}:{}", path.display(), line_num + 1);
            continue;
        }

        vars.insert(key.to_string(), unquote(value.trim()));
    }

    debug!("Parsed {} variables", vars.len());
    Ok(vars)
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].to_string();
    }
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let inner = &value[1..value.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(other) => out.push(other),
                    None => out.push('\\'),
                }
            } else {
                out.push(c);
            }
        }
        return out;
    }
    // Unquoted values may carry a trailing comment
    match value.find(" #") {
        Some(idx) => value[..idx].trim_end().to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_option_env_var_name() {
        assert_eq!(
            option_env_var_name("_BUILD_ARG_", "docker-in-docker", None),
            "_BUILD_ARG_DOCKER_IN_DOCKER"
        );
        assert_eq!(
            option_env_var_name("BP_CONTAINER_FEATURE_", "go", Some("install-tools")),
            "BP_CONTAINER_FEATURE_GO_INSTALL_TOOLS"
        );
        assert_eq!(
            option_env_var_name("_BUILD_ARG_", "node.js", Some("version")),
            "_BUILD_ARG_NODE_JS_VERSION"
        );
        assert_eq!(option_env_var_name("P_", "go", Some("")), "P_GO");
    }

    #[test]
    fn test_option_metadata_key() {
        assert_eq!(option_metadata_key("installTools"), "option_installtools");
        assert_eq!(option_metadata_key("node-gyp"), "option_node_gyp");
        assert_eq!(option_metadata_key("buildMode"), "option_buildmode");
    }

    #[test]
    fn test_non_empty_lookup() {
        let mut env = HashMap::new();
        env.insert("SET".to_string(), "x".to_string());
        env.insert("EMPTY".to_string(), String::new());
        assert_eq!(env.non_empty("SET").as_deref(), Some("x"));
        assert_eq!(env.non_empty("EMPTY"), None);
        assert_eq!(env.non_empty("MISSING"), None);
    }

    #[test]
    fn test_parse_env_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# written by detect").unwrap();
        writeln!(file, "_BUILD_ARG_GO_VERSION=1.19").unwrap();
        writeln!(file, "export _BUILD_ARG_GO_TOOLS=\"gopls dlv\"").unwrap();
        writeln!(file, "_BUILD_ARG_GO_ROOT='/usr/local/go' ").unwrap();
        writeln!(file, "_BUILD_ARG_GO_NOTE=plain # trailing").unwrap();
        writeln!(file, "not a pair").unwrap();
        writeln!(file).unwrap();

        let vars = parse_env_file(file.path()).unwrap();
        assert_eq!(vars.len(), 4);
        assert_eq!(vars["_BUILD_ARG_GO_VERSION"], "1.19");
        assert_eq!(vars["_BUILD_ARG_GO_TOOLS"], "gopls dlv");
        assert_eq!(vars["_BUILD_ARG_GO_ROOT"], "/usr/local/go");
        assert_eq!(vars["_BUILD_ARG_GO_NOTE"], "plain");
    }

    #[test]
    fn test_double_quoted_escapes() {
        assert_eq!(unquote(r#""a\"b\nc""#), "a\"b\nc");
        assert_eq!(unquote("\"\""), "");
    }
}
