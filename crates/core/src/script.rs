//! Feature script execution
//!
//! Feature scripts (`detect`, `acquire`) run one at a time as blocking child
//! processes. They inherit the process environment and stdio so their output
//! lands in the lifecycle log, and get the feature's `_BUILD_ARG_` variables
//! layered on top.

use crate::errors::{Result, ScriptError};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// How a script finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptOutcome {
    pub exit_code: i32,
    pub duration: Duration,
}

impl ScriptOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A feature script ready to run
#[derive(Debug, Clone)]
pub struct FeatureScript {
    path: PathBuf,
    env: IndexMap<String, String>,
    working_dir: Option<PathBuf>,
}

impl FeatureScript {
    /// Script at `path`, or `None` when there is no such file
    pub fn find(path: PathBuf) -> Option<Self> {
        if !path.is_file() {
            debug!("No script at {}", path.display());
            return None;
        }
        Some(Self {
            path,
            env: IndexMap::new(),
            working_dir: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Variables set on top of the inherited environment
    pub fn envs(mut self, env: &IndexMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.working_dir = Some(dir.to_path_buf());
        self
    }

    /// Run to completion and report the exit code, whatever it is
    #[instrument(skip(self), fields(script = %self.path.display()))]
    pub fn run(&self) -> Result<ScriptOutcome> {
        info!("Executing {}", self.path.display());
        let mut command = Command::new(&self.path);
        command
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let start = Instant::now();
        let status = command.status().map_err(|source| ScriptError::Spawn {
            script: self.path.display().to_string(),
            source,
        })?;
        let Some(exit_code) = status.code() else {
            return Err(ScriptError::Terminated {
                script: self.path.display().to_string(),
            }
            .into());
        };

        let outcome = ScriptOutcome {
            exit_code,
            duration: start.elapsed(),
        };
        debug!(
            "{} exited with {} after {:?}",
            self.path.display(),
            exit_code,
            outcome.duration
        );
        Ok(outcome)
    }

    /// Run and fail unless the script exits 0
    pub fn run_checked(&self) -> Result<ScriptOutcome> {
        let outcome = self.run()?;
        if !outcome.success() {
            return Err(ScriptError::NonZeroExit {
                script: self.path.display().to_string(),
                code: outcome.exit_code,
            }
            .into());
        }
        Ok(outcome)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    /// Write an executable `/bin/sh` script
    pub fn write_script(path: &Path, body: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }
}
