//! Feature declarations
//!
//! A devpack ships an ordered list of features in `devcontainer-features.json`.
//! Declaration order matters: it is the order features are detected, built
//! into layers and post-processed.

use crate::constants::{FEATURES_JSON_FILENAME, OPTION_SELECTION_ENV_PREFIX};
use crate::env::option_env_var_name;
use crate::errors::{FeatureError, Result};
use crate::settings::DevpackSettings;
use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Mount requested by a feature
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureMount {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target: String,
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub mount_type: String,
}

impl FeatureMount {
    /// devcontainer.json / `--mount` string form
    pub fn to_mount_string(&self) -> String {
        format!(
            "source={},target={},type={}",
            self.source, self.target, self.mount_type
        )
    }
}

/// Legal values for one feature option
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionSpec {
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub option_type: String,
    #[serde(default, rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proposals: Vec<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_default_without_nulls"
    )]
    pub default: Option<Value>,
    #[serde(default)]
    pub description: String,
}

/// One entry of `devcontainer-features.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureConfig {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub options: IndexMap<String, OptionSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,
    #[serde(
        default,
        skip_serializing_if = "IndexMap::is_empty",
        serialize_with = "serialize_settings_without_nulls"
    )]
    pub settings: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entrypoint: String,
    #[serde(default)]
    pub privileged: bool,
    #[serde(default)]
    pub init: bool,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub container_env: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<FeatureMount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cap_add: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security_opt: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub build_arg: String,
}

impl FeatureConfig {
    /// `<publisher>/<featureSet>/<id>`, the join key between features and plan entries
    pub fn full_id(&self, settings: &DevpackSettings) -> String {
        format!(
            "{}/{}/{}",
            settings.publisher, settings.feature_set, self.id
        )
    }

    /// `<buildpack>/features/<id>/bin/<script>`
    pub fn script_path(&self, buildpack_dir: &Path, script: &str) -> PathBuf {
        buildpack_dir
            .join("features")
            .join(&self.id)
            .join("bin")
            .join(script)
    }

    /// Environment variable name for this feature under `prefix`
    pub fn env_var_name(&self, prefix: &str, option_id: Option<&str>) -> String {
        option_env_var_name(prefix, &self.id, option_id)
    }

    /// Variables handed to this feature's scripts on top of the inherited environment.
    ///
    /// Always contains `_BUILD_ARG_<ID>=true`, then one variable per non-empty
    /// selection, then the additional variables under the same prefix.
    pub fn build_environment(
        &self,
        selections: &IndexMap<String, String>,
        additional: &[(&str, String)],
    ) -> IndexMap<String, String> {
        let mut env = IndexMap::new();
        env.insert(
            self.env_var_name(OPTION_SELECTION_ENV_PREFIX, None),
            "true".to_string(),
        );
        for (option_id, selection) in selections {
            if !selection.is_empty() {
                env.insert(
                    self.env_var_name(OPTION_SELECTION_ENV_PREFIX, Some(option_id)),
                    selection.clone(),
                );
            }
        }
        for (name, value) in additional {
            env.insert(
                self.env_var_name(OPTION_SELECTION_ENV_PREFIX, Some(name)),
                value.clone(),
            );
        }
        env
    }
}

/// Contents of `devcontainer-features.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeaturesJson {
    #[serde(default)]
    pub features: Vec<FeatureConfig>,
}

impl FeaturesJson {
    /// Load and validate `devcontainer-features.json` from `features_path`
    #[instrument(level = "debug")]
    pub fn load(features_path: &Path) -> Result<Self> {
        let path = features_path.join(FEATURES_JSON_FILENAME);
        if !path.is_file() {
            return Err(FeatureError::NotFound {
                path: path.display().to_string(),
            }
            .into());
        }

        let content = std::fs::read_to_string(&path).map_err(FeatureError::Io)?;
        let features_json: FeaturesJson =
            serde_json::from_str(&content).map_err(|e| FeatureError::Parsing {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        let mut seen = HashSet::new();
        for feature in &features_json.features {
            if !seen.insert(feature.id.as_str()) {
                return Err(FeatureError::DuplicateId {
                    id: feature.id.clone(),
                }
                .into());
            }
        }

        debug!("Loaded {} feature declarations", features_json.features.len());
        Ok(features_json)
    }

    /// Feature ids in declared order
    pub fn ids(&self) -> Vec<String> {
        self.features.iter().map(|f| f.id.clone()).collect()
    }
}

/// What a build layer records about the feature it installed.
///
/// Written to the layer TOML under `com.microsoft.devcontainer.feature` and
/// read back from the lifecycle image label during finalize.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerFeatureMetadata {
    /// Full feature id
    pub id: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub config: FeatureConfig,
    #[serde(default)]
    pub option_selections: IndexMap<String, String>,
}

/// Union of the container-level settings of several applied features
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedFeatureConfig {
    /// True if any feature asks for a privileged container
    pub privileged: bool,
    /// True if any feature asks for an init process
    pub init: bool,
    /// Capabilities, upper-cased and deduplicated in first-seen order
    pub cap_add: Vec<String>,
    /// Security options, deduplicated in first-seen order
    pub security_opt: Vec<String>,
    pub extensions: Vec<String>,
    /// Editor settings; the first feature to set a key wins
    pub settings: IndexMap<String, Value>,
    pub mounts: Vec<FeatureMount>,
}

impl MergedFeatureConfig {
    /// Merge feature configs in the given order
    pub fn merge<'a, I>(configs: I) -> Self
    where
        I: IntoIterator<Item = &'a FeatureConfig>,
    {
        let mut merged = MergedFeatureConfig::default();
        for config in configs {
            merged.privileged |= config.privileged;
            merged.init |= config.init;
            for cap in &config.cap_add {
                push_unique(&mut merged.cap_add, cap.to_uppercase());
            }
            for opt in &config.security_opt {
                push_unique(&mut merged.security_opt, opt.clone());
            }
            for ext in &config.extensions {
                push_unique(&mut merged.extensions, ext.clone());
            }
            for (key, value) in &config.settings {
                merged
                    .settings
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
            for mount in &config.mounts {
                if !merged.mounts.contains(mount) {
                    merged.mounts.push(mount.clone());
                }
            }
        }
        merged
    }

    /// `docker run` style arguments for the merged settings
    pub fn to_run_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.privileged {
            args.push("--privileged".to_string());
        }
        if self.init {
            args.push("--init".to_string());
        }
        for cap in &self.cap_add {
            args.push(format!("--cap-add={}", cap));
        }
        for opt in &self.security_opt {
            args.push(format!("--security-opt={}", opt));
        }
        args
    }
}

/// `value` with every `null` removed, including inside arrays and objects.
///
/// Feature configs are recorded in layer TOML, which has no null.
pub fn without_nulls(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Array(items) => Some(Value::Array(items.iter().filter_map(without_nulls).collect())),
        Value::Object(map) => Some(Value::Object(
            map.iter()
                .filter_map(|(k, v)| without_nulls(v).map(|v| (k.clone(), v)))
                .collect(),
        )),
        other => Some(other.clone()),
    }
}

fn serialize_settings_without_nulls<S: Serializer>(
    settings: &IndexMap<String, Value>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(None)?;
    for (key, value) in settings {
        if let Some(value) = without_nulls(value) {
            map.serialize_entry(key, &value)?;
        }
    }
    map.end()
}

fn serialize_default_without_nulls<S: Serializer>(
    default: &Option<Value>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    default.as_ref().and_then(without_nulls).serialize(serializer)
}

/// Append `value` unless already present
pub fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}
