//! Buildpack detect phase
//!
//! Every declared feature is either *detected* (the user asked for it, or its
//! detect script said yes) and goes into the base plan as provided and
//! required, or is only *provided*. The lifecycle has no optional provides,
//! so each non-empty subset of the only-provided features becomes its own
//! `[[or]]` alternative. Detection always passes.

use crate::cnb::{write_toml, BuildPlan, DetectPlan, Provide, Require};
use crate::combinations::non_empty_subsets;
use crate::constants::{
    BUILD_MODE_OPTION, DETECT_NOT_DETECTED_EXIT_CODE, OPTION_SELECTION_ENV_PREFIX,
    SELECTION_ENV_FILE_VARIABLE,
};
use crate::devcontainer::DevContainerDocument;
use crate::env::{option_metadata_key, parse_env_file, EnvLookup};
use crate::errors::{DevpackerError, Result, ScriptError};
use crate::features::{FeatureConfig, FeaturesJson};
use crate::options::{merge_env_selections, resolve_requested_options, OptionSelections};
use crate::script::FeatureScript;
use crate::settings::{BuildMode, DevpackSettings};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Inputs of one detect run
#[derive(Debug, Clone)]
pub struct DetectContext {
    pub buildpack_dir: PathBuf,
    pub app_dir: PathBuf,
    pub mode: BuildMode,
}

/// Outcome for one feature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureDetection {
    pub full_id: String,
    pub detected: bool,
    pub selections: OptionSelections,
}

impl FeatureDetection {
    fn provide(&self) -> Provide {
        Provide {
            name: self.full_id.clone(),
        }
    }

    /// Requirement carrying `option_<opt>` selections and `option_buildmode`
    fn require(&self, mode: BuildMode) -> Require {
        let mut metadata = toml::Table::new();
        for (option_id, selection) in &self.selections {
            metadata.insert(
                option_metadata_key(option_id),
                toml::Value::String(selection.clone()),
            );
        }
        metadata.insert(
            option_metadata_key(BUILD_MODE_OPTION),
            toml::Value::String(mode.as_str().to_string()),
        );
        Require {
            name: self.full_id.clone(),
            metadata,
        }
    }
}

/// Decide whether one feature applies to the app
#[instrument(skip_all, fields(feature = %feature.id))]
pub fn detect_feature(
    ctx: &DetectContext,
    settings: &DevpackSettings,
    feature: &FeatureConfig,
    devcontainer_features: Option<&Map<String, Value>>,
    env: &dyn EnvLookup,
) -> Result<FeatureDetection> {
    let full_id = feature.full_id(settings);
    let resolution = resolve_requested_options(feature, &full_id, devcontainer_features, env);
    let requested = resolution.requested();
    let mut selections = resolution.selections;

    if requested {
        debug!("{} requested explicitly", full_id);
        return Ok(FeatureDetection {
            full_id,
            detected: true,
            selections,
        });
    }

    let Some(script) = FeatureScript::find(feature.script_path(&ctx.buildpack_dir, "detect"))
    else {
        return Ok(FeatureDetection {
            full_id,
            detected: false,
            selections,
        });
    };

    let script_name = script.path().display().to_string();
    let selection_dir = tempfile::TempDir::new().map_err(|e| DevpackerError::io("tempdir", e))?;
    let selection_file = selection_dir.path().join("devcontainer-features.env");
    let script_env = feature.build_environment(
        &selections,
        &[(
            SELECTION_ENV_FILE_VARIABLE,
            selection_file.display().to_string(),
        )],
    );

    let outcome = script
        .envs(&script_env)
        .current_dir(&ctx.app_dir)
        .run()?;

    let detected = match outcome.exit_code {
        0 => {
            if selection_file.is_file() {
                let written = parse_env_file(&selection_file)?;
                merge_env_selections(
                    feature,
                    OPTION_SELECTION_ENV_PREFIX,
                    &written,
                    &mut selections,
                );
            }
            true
        }
        DETECT_NOT_DETECTED_EXIT_CODE => false,
        code => {
            return Err(ScriptError::NonZeroExit {
                script: script_name,
                code,
            }
            .into())
        }
    };

    Ok(FeatureDetection {
        full_id,
        detected,
        selections,
    })
}

/// Base plan plus one alternative per non-empty subset of only-provided features
pub fn candidate_plans(detections: &[FeatureDetection], mode: BuildMode) -> DetectPlan {
    let mut base = BuildPlan::default();
    let mut only_provided = Vec::new();
    for detection in detections {
        if detection.detected {
            base.provides.push(detection.provide());
            base.requires.push(detection.require(mode));
        } else {
            only_provided.push(detection.provide());
        }
    }

    let mut plans = vec![base.clone()];
    for subset in non_empty_subsets(only_provided.len()) {
        let mut plan = base.clone();
        plan.provides
            .extend(subset.iter().map(|&i| only_provided[i].clone()));
        plans.push(plan);
    }
    DetectPlan::from_plans(plans)
}

/// Run detection for every declared feature and write the plan to `plan_path`
#[instrument(skip(ctx, env), fields(buildpack = %ctx.buildpack_dir.display()))]
pub fn run_detect(ctx: &DetectContext, plan_path: &Path, env: &dyn EnvLookup) -> Result<DetectPlan> {
    let settings = DevpackSettings::load(&ctx.buildpack_dir)?;
    let features = FeaturesJson::load(&ctx.buildpack_dir)?;
    info!(
        "Detecting {} feature(s) in {} mode",
        features.features.len(),
        ctx.mode
    );

    let devcontainer_features = match ctx.mode {
        BuildMode::Devcontainer => Some(DevContainerDocument::load(&ctx.app_dir)?.features()),
        BuildMode::Production => None,
    };

    let mut detections = Vec::with_capacity(features.features.len());
    for feature in &features.features {
        let detection = detect_feature(
            ctx,
            &settings,
            feature,
            devcontainer_features.as_ref(),
            env,
        )?;
        if detection.detected {
            info!("{} detected", detection.full_id);
        } else {
            info!("{} provided", detection.full_id);
        }
        detections.push(detection);
    }

    let plan = candidate_plans(&detections, ctx.mode);
    debug!("Writing {} candidate plan(s)", plan.plan_count());
    write_toml(plan_path, &plan)?;
    Ok(plan)
}
