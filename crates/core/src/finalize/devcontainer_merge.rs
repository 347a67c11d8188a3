//! Merge applied features back into devcontainer.json
//!
//! Only the keys finalize owns are touched. Array properties are unioned so
//! entries the user wrote, including non-string ones, stay in place.

use crate::constants::DEVPACK_OUTPUT_SUFFIX;
use crate::errors::{FeatureError, Result};
use crate::features::{LayerFeatureMetadata, MergedFeatureConfig};
use crate::fsutil::write_file;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Keys that describe how to build the image, which finalize replaces with `image`
const BUILD_KEYS: [&str; 2] = ["build", "dockerComposeFile"];

/// Whether devcontainer.json feature key `key` refers to the applied feature `id`
fn supersedes(id: &str, key: &str) -> bool {
    key == id
        || key
            .strip_prefix(id)
            .is_some_and(|rest| rest.starts_with('@'))
}

/// devcontainer.json key for an applied feature
fn feature_key(metadata: &LayerFeatureMetadata) -> String {
    if metadata.version.is_empty() {
        metadata.id.clone()
    } else {
        format!("{}@{}", metadata.id, metadata.version)
    }
}

/// Replace superseded feature references with the selections the layers
/// recorded, keyed `<id>@<version>`
pub fn merge_features(
    features: &mut Map<String, Value>,
    applied: &IndexMap<String, LayerFeatureMetadata>,
) {
    features.retain(|key, _| {
        let superseded = applied.keys().any(|id| supersedes(id, key));
        if superseded {
            debug!("Replacing devcontainer.json reference {}", key);
        }
        !superseded
    });
    for metadata in applied.values() {
        let selections: Map<String, Value> = metadata
            .option_selections
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        features.insert(feature_key(metadata), Value::Object(selections));
    }
}

/// Run `f` on the object at `key`, replacing anything that is not an object
fn with_object(properties: &mut Map<String, Value>, key: &str, f: impl FnOnce(&mut Map<String, Value>)) {
    let entry = properties
        .entry(key)
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let Value::Object(map) = entry {
        f(map);
    }
}

fn union_strings(properties: &mut Map<String, Value>, key: &str, additions: Vec<String>) {
    if additions.is_empty() {
        return;
    }
    let entry = properties
        .entry(key)
        .or_insert_with(|| Value::Array(Vec::new()));
    if !entry.is_array() {
        *entry = Value::Array(Vec::new());
    }
    if let Value::Array(items) = entry {
        for addition in additions {
            let value = Value::String(addition);
            if !items.contains(&value) {
                items.push(value);
            }
        }
    }
}

/// Apply everything the built image implies to a devcontainer.json map
pub fn merge_into_devcontainer(
    properties: &mut Map<String, Value>,
    image: &str,
    applied: &IndexMap<String, LayerFeatureMetadata>,
) {
    with_object(properties, "features", |features| merge_features(features, applied));

    let merged = MergedFeatureConfig::merge(applied.values().map(|m| &m.config));
    union_strings(properties, "runArgs", merged.to_run_args());
    union_strings(properties, "extensions", merged.extensions.clone());
    union_strings(
        properties,
        "mounts",
        merged.mounts.iter().map(|m| m.to_mount_string()).collect(),
    );

    if !merged.settings.is_empty() {
        with_object(properties, "settings", |settings| {
            for (key, value) in merged.settings.iter() {
                settings.entry(key.clone()).or_insert_with(|| value.clone());
            }
        });
    }

    properties.insert("image".to_string(), Value::String(image.to_string()));
    properties.insert(
        "userEnvProbe".to_string(),
        Value::String("loginInteractiveShell".to_string()),
    );
    properties.retain(|key, _| !BUILD_KEYS.contains(&key.as_str()));
}

/// Where finalize writes its devcontainer.json
pub fn output_path(devcontainer_json: Option<&Path>, app_dir: &Path) -> PathBuf {
    let source = devcontainer_json
        .map(Path::to_path_buf)
        .unwrap_or_else(|| app_dir.join(".devcontainer").join("devcontainer.json"));
    let mut name = source.into_os_string();
    name.push(DEVPACK_OUTPUT_SUFFIX);
    PathBuf::from(name)
}

/// Write `properties` tab-indented
pub fn write_devcontainer(path: &Path, properties: &Map<String, Value>) -> Result<()> {
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"\t"));
    properties
        .serialize(&mut serializer)
        .map_err(FeatureError::Json)?;
    buf.push(b'\n');
    write_file(path, buf, 0o644)
}
