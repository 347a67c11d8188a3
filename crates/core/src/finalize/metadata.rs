//! Feature metadata read back from image labels
//!
//! The lifecycle copies each layer's TOML metadata into the
//! `io.buildpacks.lifecycle.metadata` label as JSON. A single inspect call
//! pulls that label together with the build mode and done-marker labels and
//! the image user.

use crate::constants::{
    BUILD_MODE_METADATA_ID, FEATURE_LAYER_METADATA_ID, LIFECYCLE_METADATA_LABEL,
    POST_PROCESSING_DONE_METADATA_ID,
};
use crate::features::LayerFeatureMetadata;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

/// Go template for `docker image inspect -f` producing an [`ImageFeatureLabels`] document
pub fn inspect_template() -> String {
    format!(
        concat!(
            "{{\"lifecycle\": {{{{ index .Config.Labels \"{lifecycle}\" }}}}, ",
            "\"buildmode\": \"{{{{ index .Config.Labels \"{mode}\" }}}}\", ",
            "\"done\": \"{{{{ index .Config.Labels \"{done}\" }}}}\", ",
            "\"user\": \"{{{{.Config.User}}}}\"}}"
        ),
        lifecycle = LIFECYCLE_METADATA_LABEL,
        mode = BUILD_MODE_METADATA_ID,
        done = POST_PROCESSING_DONE_METADATA_ID,
    )
}

/// Layer entry in the lifecycle label
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LifecycleLayer {
    #[serde(default)]
    pub data: Option<Value>,
}

/// Buildpack entry in the lifecycle label
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LifecycleBuildpack {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub layers: IndexMap<String, LifecycleLayer>,
}

/// The parts of `io.buildpacks.lifecycle.metadata` finalize reads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LifecycleMetadata {
    #[serde(default)]
    pub buildpacks: Vec<LifecycleBuildpack>,
}

/// Result of rendering [`inspect_template`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageFeatureLabels {
    #[serde(default)]
    pub lifecycle: LifecycleMetadata,
    #[serde(default)]
    pub buildmode: String,
    #[serde(default)]
    pub done: String,
    #[serde(default)]
    pub user: String,
}

impl ImageFeatureLabels {
    /// Parse inspect output. Anything unparseable means "no feature metadata".
    pub fn parse(output: &str) -> Self {
        let output = output.trim();
        if output.is_empty() {
            return Self::default();
        }
        match serde_json::from_str(output) {
            Ok(labels) => labels,
            Err(e) => {
                warn!(
                    "Unable to process feature metadata in image ({}); assuming no post processing is required",
                    e
                );
                Self::default()
            }
        }
    }

    /// Feature metadata of every layer, keyed by full feature id, in label order
    pub fn feature_metadata(&self) -> IndexMap<String, LayerFeatureMetadata> {
        let mut features = IndexMap::new();
        for buildpack in &self.lifecycle.buildpacks {
            for (layer_name, layer) in &buildpack.layers {
                let Some(raw) = layer
                    .data
                    .as_ref()
                    .and_then(|data| data.get(FEATURE_LAYER_METADATA_ID))
                else {
                    continue;
                };
                match serde_json::from_value::<LayerFeatureMetadata>(raw.clone()) {
                    Ok(metadata) => {
                        debug!(
                            "Layer {} of {} applied {}",
                            layer_name, buildpack.key, metadata.id
                        );
                        features.insert(metadata.id.clone(), metadata);
                    }
                    Err(e) => warn!(
                        "Ignoring malformed feature metadata on layer {} of {}: {}",
                        layer_name, buildpack.key, e
                    ),
                }
            }
        }
        features
    }
}

/// Space-delimited set of feature ids whose post-processing already ran
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoneMarker {
    ids: Vec<String>,
}

impl DoneMarker {
    pub fn from_label(label: &str) -> Self {
        let mut marker = Self::default();
        for id in label.split_whitespace() {
            marker.insert(id);
        }
        marker
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|existing| existing == id)
    }

    /// Add `id`; returns false if it was already present
    pub fn insert(&mut self, id: &str) -> bool {
        if self.contains(id) {
            return false;
        }
        self.ids.push(id.to_string());
        true
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }
}

impl fmt::Display for DoneMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ids.join(" "))
    }
}
