//! Post-processing image build
//!
//! Features with a staged `configure` script, or a `containerEnv` the
//! lifecycle cannot express as a plain layer env file, are finished with a
//! `docker build` on top of the buildpack output. The done marker label keeps
//! reruns from configuring a feature twice.

use super::metadata::DoneMarker;
use crate::docker::ImageRuntime;
use crate::errors::{DevpackerError, Result};
use crate::features::LayerFeatureMetadata;
use crate::fsutil::write_file;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, instrument};

const POST_PROCESSING_SCRIPT: &str = include_str!("../../assets/post-processing.sh");
const POST_PROCESSING_DOCKERFILE: &str = include_str!("../../assets/post-processing.Dockerfile");

static CONTAINER_ENV_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{containerEnv:([^}]+)\}").expect("Valid regex pattern"));

/// Which features still need post-processing and what the image looks like after
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostProcessingPlan {
    /// Full ids to configure, in label order
    pub required: Vec<String>,
    /// Marker to record on the resulting image
    pub done: DoneMarker,
    /// `ENV` instructions for the required features' containerEnv
    pub env_lines: Vec<String>,
}

impl PostProcessingPlan {
    /// Split `features` into already-done and required against `done`
    pub fn new(features: &IndexMap<String, LayerFeatureMetadata>, done: &DoneMarker) -> Self {
        let mut plan = Self {
            required: Vec::new(),
            done: done.clone(),
            env_lines: Vec::new(),
        };
        for (id, metadata) in features {
            if done.contains(id) {
                debug!("Post processing already done for {}", id);
                continue;
            }
            plan.required.push(id.clone());
            plan.done.insert(id);
            plan.env_lines.extend(
                metadata
                    .config
                    .container_env
                    .iter()
                    .map(|(name, value)| env_instruction(name, value)),
            );
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
    }

    /// The embedded Dockerfile with the `ENV` instructions appended
    pub fn dockerfile(&self) -> String {
        let mut dockerfile = POST_PROCESSING_DOCKERFILE.trim_end().to_string();
        for line in &self.env_lines {
            dockerfile.push('\n');
            dockerfile.push_str(line);
        }
        dockerfile.push('\n');
        dockerfile
    }

    /// `docker build` arguments tagging the result as `image`
    pub fn build_args(&self, image: &str, user: &str) -> Vec<String> {
        let user = if user.trim().is_empty() { "root" } else { user.trim() };
        vec![
            "build".to_string(),
            "--no-cache".to_string(),
            "--build-arg".to_string(),
            format!("IMAGE_NAME={}", image),
            "--build-arg".to_string(),
            format!("IMAGE_USER={}", user),
            "--build-arg".to_string(),
            format!("POST_PROCESSING_REQUIRED={}", self.required.join(" ")),
            "--build-arg".to_string(),
            format!("POST_PROCESSING_DONE={}", self.done.to_string().trim()),
            "-t".to_string(),
            image.to_string(),
            "-f".to_string(),
            "Dockerfile".to_string(),
            ".".to_string(),
        ]
    }
}

/// `ENV name="value"` with `${containerEnv:X}` rewritten to `${X}`
pub fn env_instruction(name: &str, value: &str) -> String {
    let value = CONTAINER_ENV_REF.replace_all(value, "$${${1}}");
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("ENV {}=\"{}\"", name, escaped)
}

/// Build the post-processing image in a throwaway context directory
#[instrument(skip(runtime, plan), fields(required = plan.required.len()))]
pub fn run_post_processing<R: ImageRuntime>(
    runtime: &R,
    image: &str,
    user: &str,
    plan: &PostProcessingPlan,
) -> Result<()> {
    if plan.is_empty() {
        info!("No post processing required for {}", image);
        return Ok(());
    }
    info!("Post processing {}: {}", image, plan.required.join(", "));

    let context = tempfile::Builder::new()
        .prefix("devpacker-post-processing")
        .tempdir()
        .map_err(|e| DevpackerError::io(std::env::temp_dir(), e))?;
    write_file(
        &context.path().join("post-processing.sh"),
        POST_PROCESSING_SCRIPT,
        0o755,
    )?;
    write_file(&context.path().join("Dockerfile"), plan.dockerfile(), 0o644)?;

    runtime.build_image(context.path(), &plan.build_args(image, user))?;
    debug!("Removing {}", context.path().display());
    context
        .close()
        .map_err(|e| DevpackerError::io(std::env::temp_dir(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureConfig;
    use std::cell::RefCell;
    use std::fs;
    use std::path::{Path, PathBuf};

    fn feature(id: &str, env: &[(&str, &str)]) -> (String, LayerFeatureMetadata) {
        let config = FeatureConfig {
            id: id.rsplit('/').next().unwrap_or(id).to_string(),
            container_env: env
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        };
        (
            id.to_string(),
            LayerFeatureMetadata {
                id: id.to_string(),
                version: "1.0.0".to_string(),
                config,
                option_selections: IndexMap::new(),
            },
        )
    }

    #[derive(Default)]
    struct RecordingRuntime {
        builds: RefCell<Vec<(PathBuf, Vec<String>, String, bool)>>,
    }

    impl ImageRuntime for RecordingRuntime {
        fn inspect_image(&self, _image: &str, _template: &str) -> Result<String> {
            Ok(String::new())
        }

        fn build_image(&self, context_dir: &Path, args: &[String]) -> Result<()> {
            let dockerfile = fs::read_to_string(context_dir.join("Dockerfile")).unwrap();
            let script = context_dir.join("post-processing.sh").is_file();
            self.builds.borrow_mut().push((
                context_dir.to_path_buf(),
                args.to_vec(),
                dockerfile,
                script,
            ));
            Ok(())
        }
    }

    #[test]
    fn test_only_new_features_are_required() {
        let features: IndexMap<_, _> = [feature("f1", &[]), feature("f3", &[("A", "1")])]
            .into_iter()
            .collect();
        let plan = PostProcessingPlan::new(&features, &DoneMarker::from_label("f1 f2"));

        assert_eq!(plan.required, vec!["f3"]);
        assert_eq!(plan.done.to_string(), "f1 f2 f3");
        assert_eq!(plan.env_lines, vec!["ENV A=\"1\""]);
    }

    #[test]
    fn test_env_instruction_rewrites_references() {
        assert_eq!(
            env_instruction("PATH", "${containerEnv:GOROOT}/bin:${PATH}"),
            "ENV PATH=\"${GOROOT}/bin:${PATH}\""
        );
        assert_eq!(env_instruction("Q", "say \"hi\""), "ENV Q=\"say \\\"hi\\\"\"");
    }

    #[test]
    fn test_build_args() {
        let features: IndexMap<_, _> = [feature("p/s/a", &[]), feature("p/s/b", &[])]
            .into_iter()
            .collect();
        let plan = PostProcessingPlan::new(&features, &DoneMarker::default());
        let args = plan.build_args("myimage", "");
        assert_eq!(
            args,
            vec![
                "build",
                "--no-cache",
                "--build-arg",
                "IMAGE_NAME=myimage",
                "--build-arg",
                "IMAGE_USER=root",
                "--build-arg",
                "POST_PROCESSING_REQUIRED=p/s/a p/s/b",
                "--build-arg",
                "POST_PROCESSING_DONE=p/s/a p/s/b",
                "-t",
                "myimage",
                "-f",
                "Dockerfile",
                "."
            ]
        );
        assert!(plan.build_args("i", "vscode").contains(&"IMAGE_USER=vscode".to_string()));
    }

    #[test]
    fn test_run_post_processing_builds_and_cleans_up() {
        let features: IndexMap<_, _> = [feature("p/s/go", &[("GOROOT", "/usr/local/go")])]
            .into_iter()
            .collect();
        let plan = PostProcessingPlan::new(&features, &DoneMarker::default());
        let runtime = RecordingRuntime::default();

        run_post_processing(&runtime, "img", "vscode", &plan).unwrap();

        let builds = runtime.builds.borrow();
        assert_eq!(builds.len(), 1);
        let (context, args, dockerfile, script) = &builds[0];
        assert!(script);
        assert!(dockerfile.starts_with("ARG IMAGE_NAME\nFROM ${IMAGE_NAME}"));
        assert!(dockerfile.ends_with("USER ${IMAGE_USER}\nENV GOROOT=\"/usr/local/go\"\n"));
        assert!(args.contains(&"POST_PROCESSING_REQUIRED=p/s/go".to_string()));
        assert!(!context.exists());
    }

    #[test]
    fn test_nothing_required_skips_build() {
        let features: IndexMap<_, _> = [feature("f1", &[])].into_iter().collect();
        let plan = PostProcessingPlan::new(&features, &DoneMarker::from_label("f1"));
        let runtime = RecordingRuntime::default();

        run_post_processing(&runtime, "img", "", &plan).unwrap();
        assert!(runtime.builds.borrow().is_empty());
    }
}
