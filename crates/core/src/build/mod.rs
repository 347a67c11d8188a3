//! Buildpack build phase
//!
//! Reconciles the buildpack plan against the declared features, contributes
//! one layer per matched feature in declared order, then records unmet
//! entries in `build.toml` and the build mode as an image label in
//! `launch.toml`. In devcontainer mode the application folder is emptied so
//! source code does not end up in the image; devcontainer.json is kept.

use crate::cnb::{read_toml, write_toml, BuildToml, BuildpackPlan, Label, LaunchToml};
use crate::constants::{BUILD_MODE_METADATA_ID, OMIT_APP_DIR_ENV_VAR};
use crate::devcontainer::find_devcontainer_json;
use crate::env::EnvLookup;
use crate::errors::{DevpackerError, Result};
use crate::features::FeaturesJson;
use crate::fsutil::clear_dir;
use crate::plan::reconcile;
use crate::settings::{BuildMode, DevpackSettings};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

pub mod env;
pub mod layer;

pub use layer::{contribute_layer, LayerContext, LayerOutcome};

/// Inputs of one build run
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub buildpack_dir: PathBuf,
    pub app_dir: PathBuf,
    pub layers_dir: PathBuf,
    pub mode: BuildMode,
}

/// Summary of a build run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Full ids of features that got a layer
    pub contributed: Vec<String>,
    /// Full ids of matched features with nothing to install
    pub skipped: Vec<String>,
    /// Plan entries no declared feature consumed
    pub unmet: Vec<String>,
    /// Whether the application folder was emptied
    pub app_dir_cleared: bool,
}

/// Run the build phase for the plan at `plan_path`
#[instrument(skip(ctx, env), fields(layers = %ctx.layers_dir.display()))]
pub fn run_build(ctx: &BuildContext, plan_path: &Path, env: &dyn EnvLookup) -> Result<BuildReport> {
    let settings = DevpackSettings::load(&ctx.buildpack_dir)?;
    let features = FeaturesJson::load(&ctx.buildpack_dir)?;
    let plan: BuildpackPlan = read_toml(plan_path)?;
    info!(
        "Building {} plan entries against {} feature(s) in {} mode",
        plan.entries.len(),
        features.features.len(),
        ctx.mode
    );

    let reconciliation = reconcile(&features.features, &settings, &plan);
    let layer_ctx = LayerContext {
        buildpack_dir: &ctx.buildpack_dir,
        app_dir: &ctx.app_dir,
        layers_dir: &ctx.layers_dir,
        settings: &settings,
        mode: ctx.mode,
    };

    let mut report = BuildReport::default();
    for matched in &reconciliation.matched {
        match contribute_layer(&layer_ctx, matched)? {
            LayerOutcome::Contributed { .. } => report.contributed.push(matched.full_id.clone()),
            LayerOutcome::Skipped => report.skipped.push(matched.full_id.clone()),
        }
    }
    report.unmet = reconciliation.unmet.iter().map(|e| e.name.clone()).collect();

    write_toml(
        &ctx.layers_dir.join("build.toml"),
        &BuildToml {
            unmet: reconciliation.unmet_entries(),
        },
    )?;
    write_toml(
        &ctx.layers_dir.join("launch.toml"),
        &LaunchToml {
            labels: vec![Label {
                key: BUILD_MODE_METADATA_ID.to_string(),
                value: ctx.mode.as_str().to_string(),
            }],
        },
    )?;

    if ctx.mode == BuildMode::Devcontainer
        && env.lookup(OMIT_APP_DIR_ENV_VAR).as_deref() != Some("false")
    {
        omit_app_dir(&ctx.app_dir)?;
        report.app_dir_cleared = true;
    } else {
        debug!("Leaving application folder contents in place");
    }

    info!(
        "Layers: {}, skipped: {}, unmet: {}",
        report.contributed.len(),
        report.skipped.len(),
        report.unmet.len()
    );
    Ok(report)
}

/// Empty the application folder, keeping devcontainer.json as
/// `<app>/.devcontainer.json`
pub fn omit_app_dir(app_dir: &Path) -> Result<()> {
    info!(
        "Removing contents of {} so they are not in the resulting image",
        app_dir.display()
    );
    let kept = match find_devcontainer_json(app_dir) {
        Some(path) => Some(fs::read(&path).map_err(|e| DevpackerError::io(&path, e))?),
        None => None,
    };

    clear_dir(app_dir)?;

    if let Some(contents) = kept {
        let target = app_dir.join(".devcontainer.json");
        fs::write(&target, contents).map_err(|e| DevpackerError::io(&target, e))?;
        debug!("Restored {}", target.display());
    }
    Ok(())
}
