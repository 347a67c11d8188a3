//! Buildpack API 0.7 file contracts
//!
//! Typed serde views of the TOML documents exchanged with the lifecycle:
//! the detect plan (`[[provides]]`, `[[requires]]`, `[[or]]`), the buildpack
//! plan handed to build (`[[entries]]`), the per-layer `<layer>.toml`,
//! `launch.toml`, `build.toml` and `buildpack.toml`.

use crate::errors::{DevpackerError, PlanError, Result};
use crate::features::LayerFeatureMetadata;
use crate::settings::DevpackSettings;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// A capability this buildpack can provide
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provide {
    pub name: String,
}

/// A capability required by the app
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Require {
    pub name: String,
    #[serde(default, skip_serializing_if = "toml::Table::is_empty")]
    pub metadata: toml::Table,
}

/// One candidate plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildPlan {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provides: Vec<Provide>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<Require>,
}

/// Plan written by detect: the primary plan plus alternatives
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectPlan {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provides: Vec<Provide>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<Require>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub or: Vec<BuildPlan>,
}

impl DetectPlan {
    /// First plan is primary, the rest become `[[or]]` alternatives
    pub fn from_plans(mut plans: Vec<BuildPlan>) -> Self {
        if plans.is_empty() {
            return Self::default();
        }
        let primary = plans.remove(0);
        Self {
            provides: primary.provides,
            requires: primary.requires,
            or: plans,
        }
    }

    /// Number of candidate plans, primary included
    pub fn plan_count(&self) -> usize {
        1 + self.or.len()
    }
}

/// An entry of the buildpack plan handed to build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "toml::Table::is_empty")]
    pub metadata: toml::Table,
}

impl PlanEntry {
    /// Entry without metadata
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: toml::Table::new(),
        }
    }
}

/// Buildpack plan handed to build
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildpackPlan {
    #[serde(default)]
    pub entries: Vec<PlanEntry>,
}

/// Where a layer is made available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerTypes {
    pub build: bool,
    pub launch: bool,
    pub cache: bool,
}

impl Default for LayerTypes {
    fn default() -> Self {
        Self {
            build: true,
            launch: true,
            cache: true,
        }
    }
}

/// `[metadata]` of a feature layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureLayerData {
    #[serde(rename = "com.microsoft.devcontainer.feature")]
    pub feature: LayerFeatureMetadata,
}

/// `<layers>/<layer>.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerToml {
    pub types: LayerTypes,
    pub metadata: FeatureLayerData,
}

/// An image label set through launch.toml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub key: String,
    pub value: String,
}

/// `<layers>/launch.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchToml {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
}

/// A plan entry build could not satisfy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmetEntry {
    pub name: String,
}

/// `<layers>/build.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildToml {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unmet: Vec<UnmetEntry>,
}

/// `[buildpack]` table of buildpack.toml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildpackInfo {
    pub id: String,
    pub version: String,
}

/// `[[stacks]]` entry of buildpack.toml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    pub id: String,
}

/// `[metadata]` of buildpack.toml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildpackMetadata {
    #[serde(rename = "com.microsoft.devcontainer.featureset")]
    pub featureset: DevpackSettings,
    #[serde(rename = "com.microsoft.devcontainer.features")]
    pub features: Vec<String>,
}

/// buildpack.toml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildpackToml {
    pub api: String,
    pub buildpack: BuildpackInfo,
    #[serde(default)]
    pub stacks: Vec<Stack>,
    pub metadata: BuildpackMetadata,
}

/// Decode a TOML document from `path`
pub fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| DevpackerError::io(path, e))?;
    toml::from_str(&content).map_err(|e| {
        PlanError::Parsing {
            path: path.display().to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

/// Encode `value` as TOML and write it to `path`
pub fn write_toml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = toml::to_string(value).map_err(|e| PlanError::Encoding {
        document: path.display().to_string(),
        message: e.to_string(),
    })?;
    fs::write(path, content).map_err(|e| DevpackerError::io(path, e))?;
    debug!("Wrote {}", path.display());
    Ok(())
}
