//! Finalize command implementation
//!
//! Implements `devpacker finalize`: post-processing for an image built with a
//! generated buildpack, plus a `.devpack` devcontainer.json pointing at it.

use super::folder_or_cwd;
use anyhow::Result;
use devpacker_core::docker::CliRuntime;
use devpacker_core::finalize::{finalize_image, FinalizeReport};
use devpacker_core::settings::BuildMode;
use std::path::PathBuf;
use tracing::{debug, instrument};

/// Finalize command arguments
#[derive(Debug, Clone)]
pub struct FinalizeArgs {
    /// Image to finalize
    pub image: String,
    /// Application folder; defaults to the current directory
    pub app_folder: Option<PathBuf>,
    /// Build mode override
    pub mode: Option<BuildMode>,
    /// Path to docker executable
    pub docker_path: String,
}

/// Execute the finalize command
#[instrument(skip(args), fields(image = %args.image))]
pub fn execute_finalize(args: FinalizeArgs) -> Result<()> {
    debug!("Finalize args: {:?}", args);
    let app_folder = folder_or_cwd(args.app_folder.as_deref())?;
    let runtime = CliRuntime::with_runtime_path(args.docker_path);
    let report = finalize_image(&runtime, &args.image, args.mode, &app_folder)?;
    print_report(&report);
    Ok(())
}

pub(crate) fn print_report(report: &FinalizeReport) {
    println!("{}", report.devcontainer_path.display());
    debug!(
        "Finalized in {} mode; applied: [{}], post-processed: [{}]",
        report.mode,
        report.applied.join(", "),
        report.post_processed.join(", ")
    );
}
