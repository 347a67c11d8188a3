//! `pack` CLI wrapper
//!
//! `devpacker build` hands everything after the image name to `pack build`
//! untouched. The only argument it looks at is `-p`/`--path`, which names the
//! application folder that finalize later reads devcontainer.json from. `pack`
//! resolves that path itself, relative to the directory it runs in.

use crate::constants::BUILD_MODE_ENV_VAR;
use crate::errors::{PackError, Result};
use crate::settings::BuildMode;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{info, instrument};

/// Application folder named by `-p <dir>`, `--path <dir>` or `--path=<dir>`.
///
/// The last occurrence wins, matching how `pack` itself parses flags.
pub fn app_folder_from_args(args: &[String]) -> Option<PathBuf> {
    let mut found = None;
    let mut iter = args.iter().peekable();
    while let Some(arg) = iter.next() {
        if arg == "-p" || arg == "--path" {
            if let Some(value) = iter.next_if(|next| !next.starts_with('-')) {
                found = Some(PathBuf::from(value));
            }
        } else if let Some(value) = arg.strip_prefix("--path=") {
            found = Some(PathBuf::from(value));
        }
    }
    found
}

/// Arguments of `pack build` for `image`
pub fn pack_build_args(image: &str, mode: Option<BuildMode>, pack_args: &[String]) -> Vec<String> {
    let mut args = vec!["build".to_string(), image.to_string()];
    if let Some(mode) = mode {
        args.push("-e".to_string());
        args.push(format!("{}={}", BUILD_MODE_ENV_VAR, mode));
    }
    args.extend(pack_args.iter().cloned());
    args
}

/// Runs the `pack` binary
#[derive(Debug, Clone)]
pub struct PackCli {
    pack_path: String,
}

impl PackCli {
    pub fn with_pack_path(pack_path: impl Into<String>) -> Self {
        Self {
            pack_path: pack_path.into(),
        }
    }

    /// `pack build` in `working_dir` with output streamed to the console
    #[instrument(skip(self, pack_args))]
    pub fn build(
        &self,
        image: &str,
        mode: Option<BuildMode>,
        working_dir: &Path,
        pack_args: &[String],
    ) -> Result<()> {
        let args = pack_build_args(image, mode, pack_args);
        let mut words = vec![self.pack_path.clone()];
        words.extend(args.iter().cloned());
        info!(
            "Executing in {}: {}",
            working_dir.display(),
            shell_words::join(words)
        );

        let status = Command::new(&self.pack_path)
            .args(&args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|_| PackError::NotInstalled)?;

        if !status.success() {
            return Err(PackError::BuildFailed {
                code: status.code().unwrap_or(-1),
            }
            .into());
        }
        Ok(())
    }
}

impl Default for PackCli {
    fn default() -> Self {
        Self::with_pack_path("pack")
    }
}
