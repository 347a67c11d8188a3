//! Container runtime CLI integration
//!
//! Finalize needs two things from the runtime: reading image metadata through
//! a Go template (`docker image inspect -f`) and building the post-processing
//! image. Both go through the [`ImageRuntime`] trait so tests can substitute
//! a recording double.

use crate::errors::{DockerError, Result};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info, instrument};

/// Image operations used by finalize
pub trait ImageRuntime {
    /// Render `template` against the image's inspect output
    fn inspect_image(&self, image: &str, template: &str) -> Result<String>;

    /// Run `build` with `args` inside `context_dir`, streaming its output
    fn build_image(&self, context_dir: &Path, args: &[String]) -> Result<()>;
}

impl<T: ImageRuntime> ImageRuntime for &T {
    fn inspect_image(&self, image: &str, template: &str) -> Result<String> {
        (*self).inspect_image(image, template)
    }

    fn build_image(&self, context_dir: &Path, args: &[String]) -> Result<()> {
        (*self).build_image(context_dir, args)
    }
}

/// CLI-based runtime; works for docker and podman alike
#[derive(Debug, Clone)]
pub struct CliRuntime {
    /// Runtime CLI binary path (e.g., "docker" or "podman")
    runtime_path: String,
}

impl CliRuntime {
    pub fn docker() -> Self {
        Self {
            runtime_path: "docker".to_string(),
        }
    }

    pub fn with_runtime_path(runtime_path: impl Into<String>) -> Self {
        Self {
            runtime_path: runtime_path.into(),
        }
    }

    pub fn runtime_path(&self) -> &str {
        &self.runtime_path
    }

    /// Check that the runtime binary answers `--version`
    #[instrument(skip(self))]
    pub fn check_runtime_installed(&self) -> Result<()> {
        debug!("Checking runtime binary at {}", self.runtime_path);
        match Command::new(&self.runtime_path).arg("--version").output() {
            Ok(output) if output.status.success() => Ok(()),
            Ok(output) => Err(DockerError::CLIError(format!(
                "Runtime version check failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ))
            .into()),
            Err(e) => {
                debug!("Runtime binary not found: {}", e);
                Err(DockerError::NotInstalled.into())
            }
        }
    }

    fn command_line(&self, args: &[String]) -> String {
        let mut words = vec![self.runtime_path.clone()];
        words.extend(args.iter().cloned());
        shell_words::join(words)
    }
}

impl Default for CliRuntime {
    fn default() -> Self {
        Self::docker()
    }
}

/// Docker-flavored runtime
pub type CliDocker = CliRuntime;

impl ImageRuntime for CliRuntime {
    #[instrument(skip(self, template))]
    fn inspect_image(&self, image: &str, template: &str) -> Result<String> {
        let args = [
            "image".to_string(),
            "inspect".to_string(),
            image.to_string(),
            "-f".to_string(),
            template.to_string(),
        ];
        debug!("Executing: {}", self.command_line(&args));

        let output = Command::new(&self.runtime_path)
            .args(&args)
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => DockerError::NotInstalled,
                _ => DockerError::CLIError(format!("Failed to inspect image: {}", e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DockerError::CLIError(format!(
                "Image inspect failed for {}: {}",
                image,
                stderr.trim()
            ))
            .into());
        }

        String::from_utf8(output.stdout)
            .map_err(|e| DockerError::CLIError(format!("Invalid UTF-8 in inspect output: {}", e)).into())
    }

    #[instrument(skip(self, args))]
    fn build_image(&self, context_dir: &Path, args: &[String]) -> Result<()> {
        info!("Executing: {}", self.command_line(args));
        let status = Command::new(&self.runtime_path)
            .args(args)
            .current_dir(context_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => DockerError::NotInstalled,
                _ => DockerError::CLIError(format!("Failed to build image: {}", e)),
            })?;

        if !status.success() {
            return Err(DockerError::CLIError(format!(
                "Image build failed with {}",
                status
                    .code()
                    .map(|c| format!("exit code {}", c))
                    .unwrap_or_else(|| "a signal".to_string())
            ))
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DevpackerError;
    use crate::script::test_support::write_script;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_cli_docker_default() {
        assert_eq!(CliDocker::default().runtime_path(), "docker");
        assert_eq!(
            CliRuntime::with_runtime_path("/usr/bin/podman").runtime_path(),
            "/usr/bin/podman"
        );
    }

    #[test]
    fn test_missing_binary_is_not_installed() {
        let runtime = CliRuntime::with_runtime_path("/nonexistent/docker");
        assert!(matches!(
            runtime.check_runtime_installed(),
            Err(DevpackerError::Docker(DockerError::NotInstalled))
        ));
        assert!(matches!(
            runtime.inspect_image("img", "{{.Id}}"),
            Err(DevpackerError::Docker(DockerError::NotInstalled))
        ));
    }

    #[test]
    fn test_inspect_image_returns_stdout() {
        let dir = TempDir::new().unwrap();
        let fake = dir.path().join("docker");
        write_script(&fake, "[ \"$1 $2 $3 $4\" = \"image inspect myimage -f\" ] || exit 9\nprintf '%s' \"$5\"");
        let runtime = CliRuntime::with_runtime_path(fake.display().to_string());

        let out = runtime.inspect_image("myimage", "{{.Config.User}}").unwrap();
        assert_eq!(out, "{{.Config.User}}");
    }

    #[test]
    fn test_inspect_failure_carries_stderr() {
        let dir = TempDir::new().unwrap();
        let fake = dir.path().join("docker");
        write_script(&fake, "echo 'No such image' >&2\nexit 1");
        let runtime = CliRuntime::with_runtime_path(fake.display().to_string());

        let err = runtime.inspect_image("missing", "{{.Id}}").unwrap_err();
        assert!(err.to_string().contains("No such image"));
    }

    #[test]
    fn test_build_image_runs_in_context_dir() {
        let dir = TempDir::new().unwrap();
        let fake = dir.path().join("docker");
        write_script(&fake, "echo \"$@\" > args.txt");
        let context = dir.path().join("ctx");
        fs::create_dir_all(&context).unwrap();
        let runtime = CliRuntime::with_runtime_path(fake.display().to_string());

        runtime
            .build_image(&context, &["build".to_string(), ".".to_string()])
            .unwrap();
        assert_eq!(
            fs::read_to_string(context.join("args.txt")).unwrap().trim(),
            "build ."
        );
    }

    #[test]
    fn test_build_failure_reports_exit_code() {
        let dir = TempDir::new().unwrap();
        let fake = dir.path().join("docker");
        write_script(&fake, "exit 4");
        let runtime = CliRuntime::with_runtime_path(fake.display().to_string());

        let err = runtime
            .build_image(dir.path(), &["build".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("exit code 4"));
    }
}
