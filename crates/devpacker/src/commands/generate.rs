//! Generate command implementation
//!
//! Implements `devpacker generate`, which lays out a buildpack from a folder of
//! dev container features and bundles the running executable into it.

use anyhow::{Context, Result};
use devpacker_core::generate::generate;
use std::path::PathBuf;
use tracing::{debug, instrument};

/// Generate command arguments
#[derive(Debug, Clone)]
pub struct GenerateArgs {
    /// Folder holding the feature declarations
    pub features_path: PathBuf,
    /// Where to write the buildpack
    pub output_path: PathBuf,
}

impl Default for GenerateArgs {
    fn default() -> Self {
        Self {
            features_path: PathBuf::from("."),
            output_path: PathBuf::from("out"),
        }
    }
}

/// Execute the generate command
#[instrument(skip(args))]
pub fn execute_generate(args: GenerateArgs) -> Result<()> {
    debug!("Generate args: {:?}", args);
    let executable = std::env::current_exe().context("Unable to locate the devpacker executable")?;
    let report = generate(&args.features_path, &args.output_path, &executable)?;

    println!("{}", args.output_path.display());
    debug!(
        "Buildpack {} written to {} with {} binaries",
        report.buildpack_id,
        report.buildpack_toml.display(),
        report.binaries.len()
    );
    Ok(())
}
