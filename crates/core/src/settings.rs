//! Devpack settings and build mode
//!
//! `devpack-settings.json` names the publisher and feature set that make up
//! every [`FullFeatureId`](crate::features::FeatureConfig::full_id) and the
//! buildpack id. [`BuildMode`] decides whether devcontainer.json is consulted
//! during detection and merged back during finalize.

use crate::constants::{
    BUILDPACK_DIR_ENV_VAR, BUILD_MODE_ENV_VAR, CONTAINER_IMAGE_BUILD_MARKER_PATH,
    DEVPACK_SETTINGS_FILENAME,
};
use crate::env::EnvLookup;
use crate::errors::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, instrument, warn};

/// Contents of `devpack-settings.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevpackSettings {
    /// Publisher, typically the GitHub org
    pub publisher: String,
    /// Feature set, typically the repository name
    pub feature_set: String,
    /// Version pinned into layer metadata and buildpack.toml
    #[serde(default)]
    pub version: String,
    /// Buildpack API to target
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    /// Stacks the generated buildpack supports
    #[serde(default)]
    pub stacks: Vec<String>,
}

impl DevpackSettings {
    /// Load `devpack-settings.json` from `features_path`
    #[instrument(level = "debug")]
    pub fn load(features_path: &Path) -> Result<Self> {
        let path = features_path.join(DEVPACK_SETTINGS_FILENAME);
        if !path.is_file() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        let content = fs::read_to_string(&path).map_err(ConfigError::Io)?;
        let settings: DevpackSettings =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parsing {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        debug!(
            "Loaded devpack settings for {}/{}",
            settings.publisher, settings.feature_set
        );
        Ok(settings)
    }

    /// Buildpack id, `<publisher>/<featureSet>`
    pub fn buildpack_id(&self) -> String {
        format!("{}/{}", self.publisher, self.feature_set)
    }
}

/// Buildpack root taken from `CNB_BUILDPACK_DIR`
pub fn buildpack_dir(env: &dyn EnvLookup) -> Result<PathBuf> {
    env.non_empty(BUILDPACK_DIR_ENV_VAR)
        .map(PathBuf::from)
        .ok_or_else(|| {
            ConfigError::MissingEnv {
                name: BUILDPACK_DIR_ENV_VAR.to_string(),
                hint: "it should point at the folder holding devcontainer-features.json, devpack-settings.json and features/".to_string(),
            }
            .into()
        })
}

/// Container image build mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BuildMode {
    /// Plain application image
    #[default]
    Production,
    /// Image intended for a dev container; devcontainer.json participates
    Devcontainer,
}

impl BuildMode {
    /// Lower-case name as used in env vars, labels and plan metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::Production => "production",
            BuildMode::Devcontainer => "devcontainer",
        }
    }

    /// Resolve the mode for this process.
    ///
    /// Order: explicit override, `BP_DCNB_BUILD_MODE`, contents of the marker
    /// file, then `production`. Unknown env or marker values are logged and
    /// treated as `production`.
    pub fn resolve(override_mode: Option<BuildMode>, env: &dyn EnvLookup, marker: &Path) -> Self {
        if let Some(mode) = override_mode {
            debug!("Build mode {} set explicitly", mode);
            return mode;
        }

        if let Some(raw) = env.non_empty(BUILD_MODE_ENV_VAR) {
            return Self::parse_or_default(&raw, BUILD_MODE_ENV_VAR);
        }

        match fs::read_to_string(marker) {
            Ok(contents) if !contents.trim().is_empty() => {
                Self::parse_or_default(contents.trim(), &marker.display().to_string())
            }
            _ => BuildMode::default(),
        }
    }

    /// [`BuildMode::resolve`] against the well-known marker path
    pub fn detect(override_mode: Option<BuildMode>, env: &dyn EnvLookup) -> Self {
        Self::resolve(
            override_mode,
            env,
            Path::new(CONTAINER_IMAGE_BUILD_MARKER_PATH),
        )
    }

    fn parse_or_default(raw: &str, source: &str) -> Self {
        raw.parse().unwrap_or_else(|_| {
            warn!(
                "Ignoring unknown build mode '{}' from {}, using production",
                raw, source
            );
            BuildMode::Production
        })
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" => Ok(BuildMode::Production),
            "devcontainer" => Ok(BuildMode::Devcontainer),
            _ => Err(ConfigError::InvalidBuildMode {
                value: s.to_string(),
            }),
        }
    }
}
