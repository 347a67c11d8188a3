//! devcontainer.json discovery and loading
//!
//! The document is kept as an untyped, order-preserving JSON map so that
//! finalize can rewrite a handful of keys and leave everything else exactly as
//! the user wrote it. Files are JSONC; `json5` handles comments and trailing
//! commas.

use crate::errors::{ConfigError, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Look for `.devcontainer/devcontainer.json`, then `.devcontainer.json`
pub fn find_devcontainer_json(app_dir: &Path) -> Option<PathBuf> {
    let candidates = [
        app_dir.join(".devcontainer").join("devcontainer.json"),
        app_dir.join(".devcontainer.json"),
    ];
    let found = candidates.into_iter().find(|p| p.is_file());
    debug!(
        "devcontainer.json lookup in {}: {:?}",
        app_dir.display(),
        found
    );
    found
}

/// A loaded (or absent) devcontainer.json
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DevContainerDocument {
    /// Where the document was found, if anywhere
    pub path: Option<PathBuf>,
    /// Top-level properties in file order
    pub properties: Map<String, Value>,
}

impl DevContainerDocument {
    /// Discover and parse devcontainer.json under `app_dir`.
    ///
    /// A missing file yields an empty document; a malformed one is an error.
    #[instrument(level = "debug")]
    pub fn load(app_dir: &Path) -> Result<Self> {
        match find_devcontainer_json(app_dir) {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse the JSONC document at `path`
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        let value: Value = json5::from_str(&content).map_err(|e| ConfigError::Parsing {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let Value::Object(properties) = value else {
            return Err(ConfigError::Parsing {
                path: path.display().to_string(),
                message: "top level must be a JSON object".to_string(),
            }
            .into());
        };

        Ok(Self {
            path: Some(path.to_path_buf()),
            properties,
        })
    }

    /// The `features` object, or an empty map when absent or not an object
    pub fn features(&self) -> Map<String, Value> {
        match self.properties.get("features") {
            Some(Value::Object(features)) => features.clone(),
            _ => Map::new(),
        }
    }

    /// A string array property, skipping non-string items
    pub fn string_array(&self, key: &str) -> Vec<String> {
        match self.properties.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}
