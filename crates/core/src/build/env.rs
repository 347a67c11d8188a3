//! Layer environment from a feature's `containerEnv`
//!
//! Each variable becomes a file under `<layer>/env/`. A value that refers to
//! its own variable, as `${PATH}` or `${containerEnv:PATH}`, is split around
//! the reference into `NAME.prepend` and `NAME.append`; anything else is a
//! `NAME.override`. References to the feature's other containerEnv variables
//! are replaced with their raw values.

use crate::errors::{DevpackerError, Result};
use indexmap::IndexMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// How one variable changes the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvModification {
    Override(String),
    /// Either part may be empty, in which case it is not written
    Surround { prepend: String, append: String },
}

/// Translate `name=value` given the rest of the containerEnv
pub fn translate(name: &str, value: &str, container_env: &IndexMap<String, String>) -> EnvModification {
    let self_refs = [format!("${{{}}}", name), format!("${{containerEnv:{}}}", name)];
    let split = self_refs
        .iter()
        .find_map(|r| value.find(r.as_str()).map(|idx| (idx, r.len())));

    let substitute = |text: &str| substitute_others(name, text, container_env);
    match split {
        Some((idx, len)) => EnvModification::Surround {
            prepend: substitute(&value[..idx]),
            append: substitute(&value[idx + len..]),
        },
        None => EnvModification::Override(substitute(value)),
    }
}

fn substitute_others(name: &str, text: &str, container_env: &IndexMap<String, String>) -> String {
    let mut out = text.to_string();
    for (other, other_value) in container_env {
        if other == name {
            continue;
        }
        out = out
            .replace(&format!("${{containerEnv:{}}}", other), other_value)
            .replace(&format!("${{{}}}", other), other_value);
    }
    out
}

/// Write `<layer>/env/*` files for every containerEnv variable
pub fn write_layer_env(layer_dir: &Path, container_env: &IndexMap<String, String>) -> Result<()> {
    if container_env.is_empty() {
        return Ok(());
    }
    let env_dir = layer_dir.join("env");
    fs::create_dir_all(&env_dir).map_err(|e| DevpackerError::io(&env_dir, e))?;

    let write = |file: String, contents: &str| -> Result<()> {
        let path = env_dir.join(file);
        fs::write(&path, contents).map_err(|e| DevpackerError::io(&path, e))
    };

    for (name, value) in container_env {
        match translate(name, value, container_env) {
            EnvModification::Override(v) => {
                debug!("{} overridden", name);
                write(format!("{}.override", name), &v)?;
            }
            EnvModification::Surround { prepend, append } => {
                debug!("{} extended", name);
                if !prepend.is_empty() {
                    write(format!("{}.prepend", name), &prepend)?;
                }
                if !append.is_empty() {
                    write(format!("{}.append", name), &append)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn container_env(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_self_reference_splits() {
        let env = container_env(&[
            ("GOROOT", "/usr/local/go"),
            ("PATH", "${GOROOT}/bin:${PATH}:/extra"),
        ]);
        assert_eq!(
            translate("PATH", &env["PATH"], &env),
            EnvModification::Surround {
                prepend: "/usr/local/go/bin:".to_string(),
                append: ":/extra".to_string(),
            }
        );
        assert_eq!(
            translate("PATH", "${containerEnv:PATH}:/opt/bin", &env),
            EnvModification::Surround {
                prepend: String::new(),
                append: ":/opt/bin".to_string(),
            }
        );
    }

    #[test]
    fn test_plain_value_overrides() {
        let env = container_env(&[("HOME_DIR", "/home/x"), ("CACHE", "${containerEnv:HOME_DIR}/.cache")]);
        assert_eq!(
            translate("CACHE", &env["CACHE"], &env),
            EnvModification::Override("/home/x/.cache".to_string())
        );
    }

    #[test]
    fn test_write_layer_env_files() {
        let dir = TempDir::new().unwrap();
        let env = container_env(&[
            ("PACK_HOME", "/usr/local/pack"),
            ("PATH", "${PACK_HOME}/bin:${PATH}"),
            ("NOOP", "${NOOP}"),
        ]);
        write_layer_env(dir.path(), &env).unwrap();

        let env_dir = dir.path().join("env");
        assert_eq!(
            fs::read_to_string(env_dir.join("PACK_HOME.override")).unwrap(),
            "/usr/local/pack"
        );
        assert_eq!(
            fs::read_to_string(env_dir.join("PATH.prepend")).unwrap(),
            "/usr/local/pack/bin:"
        );
        assert!(!env_dir.join("PATH.append").exists());
        assert!(!env_dir.join("NOOP.override").exists());
        assert!(!env_dir.join("NOOP.prepend").exists());
    }

    #[test]
    fn test_no_container_env_writes_nothing() {
        let dir = TempDir::new().unwrap();
        write_layer_env(dir.path(), &IndexMap::new()).unwrap();
        assert!(!dir.path().join("env").exists());
    }
}
