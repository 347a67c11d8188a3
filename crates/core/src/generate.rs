//! Buildpack generation
//!
//! Turns a features folder (`devcontainer-features.json`,
//! `devpack-settings.json`, `features/`, `common/`) into a buildpack:
//! the sources are copied, `bin/detect` and `bin/build` launch the bundled
//! `devpacker-linux-<arch>` binaries, and `buildpack.toml` describes it.

use crate::cnb::{write_toml, BuildpackInfo, BuildpackMetadata, BuildpackToml, Stack};
use crate::constants::{
    BUILDPACK_BINARY_PREFIX, DEFAULT_API_VERSION, DEVPACK_SETTINGS_FILENAME,
    FEATURES_JSON_FILENAME,
};
use crate::errors::{DevpackerError, Result};
use crate::features::FeaturesJson;
use crate::fsutil::{copy_file, copy_if_exists, write_file};
use crate::settings::DevpackSettings;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

const DETECT_LAUNCHER: &str = include_str!("../assets/bin/detect");
const BUILD_LAUNCHER: &str = include_str!("../assets/bin/build");

/// Result of a generate run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateReport {
    pub buildpack_toml: PathBuf,
    pub buildpack_id: String,
    /// Binaries copied into `bin/`
    pub binaries: Vec<PathBuf>,
}

/// Go-style architecture name used in binary file names
pub fn binary_arch(rust_arch: &str) -> &str {
    match rust_arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "powerpc64" => "ppc64le",
        other => other,
    }
}

/// Generate a buildpack from `features_path` into `output_path`.
///
/// `executable` is the devpacker binary to bundle.
#[instrument(level = "info")]
pub fn generate(features_path: &Path, output_path: &Path, executable: &Path) -> Result<GenerateReport> {
    let settings = DevpackSettings::load(features_path)?;
    let features = FeaturesJson::load(features_path)?;

    let bin_dir = output_path.join("bin");
    fs::create_dir_all(&bin_dir).map_err(|e| DevpackerError::io(&bin_dir, e))?;

    for source in [
        FEATURES_JSON_FILENAME,
        DEVPACK_SETTINGS_FILENAME,
        "features",
        "common",
    ] {
        if copy_if_exists(&features_path.join(source), &output_path.join(source))? {
            debug!("Copied {}", source);
        }
    }

    write_file(&bin_dir.join("detect"), DETECT_LAUNCHER, 0o755)?;
    write_file(&bin_dir.join("build"), BUILD_LAUNCHER, 0o755)?;
    let binaries = copy_binaries(executable, &bin_dir)?;

    let buildpack = buildpack_toml(&settings, &features);
    let buildpack_toml = output_path.join("buildpack.toml");
    write_toml(&buildpack_toml, &buildpack)?;

    info!(
        "Generated buildpack {} with {} feature(s) in {}",
        buildpack.buildpack.id,
        features.features.len(),
        output_path.display()
    );
    Ok(GenerateReport {
        buildpack_toml,
        buildpack_id: buildpack.buildpack.id,
        binaries,
    })
}

/// buildpack.toml contents for a feature set
pub fn buildpack_toml(settings: &DevpackSettings, features: &FeaturesJson) -> BuildpackToml {
    let api = if settings.api_version.is_empty() {
        DEFAULT_API_VERSION.to_string()
    } else {
        settings.api_version.clone()
    };
    BuildpackToml {
        api,
        buildpack: BuildpackInfo {
            id: settings.buildpack_id(),
            version: settings.version.clone(),
        },
        stacks: settings
            .stacks
            .iter()
            .map(|id| Stack { id: id.clone() })
            .collect(),
        metadata: BuildpackMetadata {
            featureset: settings.clone(),
            features: features.ids(),
        },
    }
}

/// Copy every `devpacker-linux-*` sibling of a release binary, or the
/// binary itself renamed for the current architecture
fn copy_binaries(executable: &Path, bin_dir: &Path) -> Result<Vec<PathBuf>> {
    let name = executable
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut copied = Vec::new();
    if name.starts_with(BUILDPACK_BINARY_PREFIX) {
        let dir = executable.parent().unwrap_or_else(|| Path::new("."));
        let mut siblings: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|e| DevpackerError::io(dir, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.file_name()
                        .is_some_and(|n| n.to_string_lossy().starts_with(BUILDPACK_BINARY_PREFIX))
            })
            .collect();
        siblings.sort();
        for sibling in siblings {
            let target = bin_dir.join(sibling.file_name().unwrap_or_default());
            copy_file(&sibling, &target)?;
            copied.push(target);
        }
    } else {
        let target = bin_dir.join(format!(
            "{}{}",
            BUILDPACK_BINARY_PREFIX,
            binary_arch(std::env::consts::ARCH)
        ));
        debug!("Copying {} as {}", executable.display(), target.display());
        copy_file(executable, &target)?;
        copied.push(target);
    }
    Ok(copied)
}
