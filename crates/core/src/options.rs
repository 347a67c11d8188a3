//! Option resolution
//!
//! Selections for one feature are layered from three sources, lowest
//! precedence first:
//!
//! 1. the feature's reference in devcontainer.json (devcontainer mode only),
//!    matched by full id or `<full id>@<version>`
//! 2. `BP_CONTAINER_FEATURE_<ID>_<OPTION>` environment variables
//! 3. selections a detect script wrote to its env file, using the
//!    `_BUILD_ARG_<ID>_<OPTION>` names
//!
//! Each source only overwrites keys it sets to a non-empty value. Missing
//! sources are not errors.

use crate::constants::{PROJECT_OPTION_SELECTION_ENV_PREFIX, VERSION_OPTION};
use crate::env::EnvLookup;
use crate::features::FeatureConfig;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

/// Resolved option selections, in insertion order
pub type OptionSelections = IndexMap<String, String>;

/// Outcome of resolving the user-controlled sources for one feature
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionResolution {
    /// Final selections
    pub selections: OptionSelections,
    /// The feature is referenced in devcontainer.json
    pub referenced: bool,
    /// `BP_CONTAINER_FEATURE_<ID>` is set to something other than `false`
    pub forced: bool,
}

impl OptionResolution {
    /// The user asked for this feature, so no detect script needs to run
    pub fn requested(&self) -> bool {
        self.referenced || self.forced
    }
}

/// Resolve selections from devcontainer.json features (when given) and the
/// `BP_CONTAINER_FEATURE_` variables
pub fn resolve_requested_options(
    feature: &FeatureConfig,
    full_id: &str,
    devcontainer_features: Option<&Map<String, Value>>,
    env: &dyn EnvLookup,
) -> OptionResolution {
    let mut selections = OptionSelections::new();
    let referenced = match devcontainer_features {
        Some(features) => merge_devcontainer_reference(full_id, features, &mut selections),
        None => false,
    };
    let forced = merge_env_selections(
        feature,
        PROJECT_OPTION_SELECTION_ENV_PREFIX,
        env,
        &mut selections,
    );

    debug!(
        feature = %full_id,
        referenced,
        forced,
        "Resolved {} option selection(s)",
        selections.len()
    );
    OptionResolution {
        selections,
        referenced,
        forced,
    }
}

/// Copy selections from the first devcontainer.json feature key matching
/// `full_id`. Returns whether a matching reference exists.
pub fn merge_devcontainer_reference(
    full_id: &str,
    features: &Map<String, Value>,
    selections: &mut OptionSelections,
) -> bool {
    let versioned_prefix = format!("{}@", full_id);
    let Some((key, reference)) = features
        .iter()
        .find(|(key, _)| key.as_str() == full_id || key.starts_with(&versioned_prefix))
    else {
        return false;
    };

    debug!("Feature reference {} = {}", key, reference);
    match reference {
        Value::String(version) => insert_non_empty(selections, VERSION_OPTION, version.clone()),
        Value::Object(options) => {
            for (option_id, value) in options {
                if let Some(text) = selection_text(value) {
                    insert_non_empty(selections, option_id, text);
                }
            }
        }
        _ => {}
    }
    true
}

/// Overlay `<prefix><ID>_<OPTION>` variables for every declared option.
///
/// Returns whether `<prefix><ID>` is set to a non-empty value other than
/// `false`.
pub fn merge_env_selections(
    feature: &FeatureConfig,
    prefix: &str,
    env: &dyn EnvLookup,
    selections: &mut OptionSelections,
) -> bool {
    let enabled = env
        .non_empty(&feature.env_var_name(prefix, None))
        .is_some_and(|v| v != "false");

    for option_id in feature.options.keys() {
        if let Some(value) = env.non_empty(&feature.env_var_name(prefix, Some(option_id))) {
            selections.insert(option_id.clone(), value);
        }
    }
    enabled
}

/// String form of a JSON option value; `null` has none
pub fn selection_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn insert_non_empty(selections: &mut OptionSelections, key: &str, value: String) {
    if !value.is_empty() {
        selections.insert(key.to_string(), value);
    }
}
