//! Buildpack lifecycle entry points
//!
//! `bin/detect` and `bin/build` in a generated buildpack exec
//! `devpacker _internal detect|build` with the lifecycle's positional
//! arguments. The application is the current directory and the buildpack root
//! comes from `CNB_BUILDPACK_DIR`.

use anyhow::{Context, Result};
use devpacker_core::build::{run_build, BuildContext};
use devpacker_core::detect::{run_detect, DetectContext};
use devpacker_core::env::ProcessEnv;
use devpacker_core::settings::{buildpack_dir, BuildMode};
use std::path::PathBuf;
use tracing::{debug, info, instrument};

/// Lifecycle phase arguments
#[derive(Debug, Clone)]
pub struct PhaseArgs {
    /// Layers directory; build only
    pub layers: Option<PathBuf>,
    /// Platform directory
    pub platform: PathBuf,
    /// Plan file
    pub plan: PathBuf,
    /// Build mode override
    pub mode: Option<BuildMode>,
}

/// CNB detect
#[instrument(skip(args))]
pub fn execute_detect(args: PhaseArgs) -> Result<()> {
    debug!("Detect args: {:?}", args);
    let env = ProcessEnv;
    let ctx = DetectContext {
        buildpack_dir: buildpack_dir(&env)?,
        app_dir: std::env::current_dir().context("Unable to get current working directory")?,
        mode: BuildMode::detect(args.mode, &env),
    };
    let plan = run_detect(&ctx, &args.plan, &env)?;
    info!("Detect wrote {} candidate plan(s)", plan.plan_count());
    Ok(())
}

/// CNB build
#[instrument(skip(args))]
pub fn execute_build(args: PhaseArgs) -> Result<()> {
    debug!("Build args: {:?}", args);
    let env = ProcessEnv;
    let layers_dir = args
        .layers
        .context("The build phase requires a layers directory")?;
    let ctx = BuildContext {
        buildpack_dir: buildpack_dir(&env)?,
        app_dir: std::env::current_dir().context("Unable to get current working directory")?,
        layers_dir,
        mode: BuildMode::detect(args.mode, &env),
    };
    let report = run_build(&ctx, &args.plan, &env)?;
    debug!("Build report: {:?}", report);
    Ok(())
}
