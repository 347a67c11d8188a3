//! Finalize a buildpack-built image
//!
//! Reads the feature metadata the build layers left in the image labels, runs
//! post-processing for features that still need it, and writes a
//! devcontainer.json next to the original (suffixed `.devpack`) that points at
//! the image and records the applied feature selections.

use crate::devcontainer::{find_devcontainer_json, DevContainerDocument};
use crate::docker::ImageRuntime;
use crate::errors::Result;
use crate::settings::BuildMode;
use serde_json::Map;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

pub mod devcontainer_merge;
pub mod metadata;
pub mod post_processing;

pub use devcontainer_merge::{merge_into_devcontainer, output_path, write_devcontainer};
pub use metadata::{inspect_template, DoneMarker, ImageFeatureLabels};
pub use post_processing::{run_post_processing, PostProcessingPlan};

/// Summary of a finalize run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeReport {
    pub mode: BuildMode,
    /// Full ids of every feature found in the image labels
    pub applied: Vec<String>,
    /// Full ids post-processed by this run
    pub post_processed: Vec<String>,
    /// The `.devpack` devcontainer.json written
    pub devcontainer_path: PathBuf,
}

/// Mode from the override, then the image label, then production
fn finalize_mode(override_mode: Option<BuildMode>, label: &str) -> BuildMode {
    if let Some(mode) = override_mode {
        return mode;
    }
    if label.trim().is_empty() {
        return BuildMode::default();
    }
    label.parse().unwrap_or_else(|_| {
        warn!("Ignoring unknown build mode label '{}', using production", label);
        BuildMode::default()
    })
}

/// Finalize `image` for the application in `app_dir`
#[instrument(skip(runtime))]
pub fn finalize_image<R: ImageRuntime>(
    runtime: &R,
    image: &str,
    override_mode: Option<BuildMode>,
    app_dir: &Path,
) -> Result<FinalizeReport> {
    info!("Finalizing {} for {}", image, app_dir.display());
    let labels = ImageFeatureLabels::parse(&runtime.inspect_image(image, &inspect_template())?);
    let mode = finalize_mode(override_mode, &labels.buildmode);
    let applied = labels.feature_metadata();
    info!("Image build mode: {}, features applied: {}", mode, applied.len());

    let (devcontainer_json, mut properties) = match mode {
        BuildMode::Devcontainer => {
            let document = DevContainerDocument::load(app_dir)?;
            (document.path, document.properties)
        }
        BuildMode::Production => {
            info!("Not loading devcontainer.json contents in {} mode", mode);
            (find_devcontainer_json(app_dir), Map::new())
        }
    };

    let plan = PostProcessingPlan::new(&applied, &DoneMarker::from_label(&labels.done));
    run_post_processing(runtime, image, &labels.user, &plan)?;

    merge_into_devcontainer(&mut properties, image, &applied);
    let devcontainer_path = output_path(devcontainer_json.as_deref(), app_dir);
    write_devcontainer(&devcontainer_path, &properties)?;
    info!("Wrote {}", devcontainer_path.display());

    Ok(FinalizeReport {
        mode,
        applied: applied.keys().cloned().collect(),
        post_processed: plan.required,
        devcontainer_path,
    })
}
