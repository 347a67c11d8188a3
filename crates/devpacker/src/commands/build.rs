//! Build command implementation
//!
//! Implements `devpacker build`: `pack build` with the given arguments, then
//! finalize on the image it produced.

use super::finalize::print_report;
use super::folder_or_cwd;
use anyhow::Result;
use devpacker_core::docker::CliRuntime;
use devpacker_core::finalize::finalize_image;
use devpacker_core::pack::{app_folder_from_args, PackCli};
use devpacker_core::settings::BuildMode;
use tracing::{debug, info, instrument};

/// Build command arguments
#[derive(Debug, Clone)]
pub struct PackBuildArgs {
    /// Image name
    pub image: String,
    /// Arguments passed through to `pack build`
    pub pack_args: Vec<String>,
    /// Build mode override, forwarded to the buildpack as BP_DCNB_BUILD_MODE
    pub mode: Option<BuildMode>,
    /// Path to pack executable
    pub pack_path: String,
    /// Path to docker executable
    pub docker_path: String,
}

/// Execute the build command
#[instrument(skip(args), fields(image = %args.image))]
pub fn execute_pack_build(args: PackBuildArgs) -> Result<()> {
    debug!("Build args: {:?}", args);
    let working_dir = folder_or_cwd(None)?;
    let app_folder = match app_folder_from_args(&args.pack_args) {
        Some(path) => working_dir.join(path),
        None => working_dir.clone(),
    };
    info!("Application folder: {}", app_folder.display());

    PackCli::with_pack_path(args.pack_path).build(&args.image, args.mode, &working_dir, &args.pack_args)?;

    let runtime = CliRuntime::with_runtime_path(args.docker_path);
    let report = finalize_image(&runtime, &args.image, args.mode, &app_folder)?;
    print_report(&report);
    Ok(())
}
