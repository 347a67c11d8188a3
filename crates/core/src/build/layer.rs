//! Feature layer contribution

use super::env::write_layer_env;
use crate::cnb::{write_toml, FeatureLayerData, LayerToml};
use crate::constants::{DEV_CONTAINER_CONFIG_RELATIVE_ROOT, TARGET_PATH_OPTION};
use crate::errors::{DevpackerError, Result};
use crate::features::LayerFeatureMetadata;
use crate::fsutil::{copy_dir_all, copy_if_exists, write_file};
use crate::plan::MatchedFeature;
use crate::script::FeatureScript;
use crate::settings::{BuildMode, DevpackSettings};
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Name of the env file staged next to a configure script
pub const FEATURE_ENV_FILENAME: &str = "devcontainer-features.env";

/// Paths shared by every layer of one build
#[derive(Debug, Clone)]
pub struct LayerContext<'a> {
    pub buildpack_dir: &'a Path,
    pub app_dir: &'a Path,
    pub layers_dir: &'a Path,
    pub settings: &'a DevpackSettings,
    pub mode: BuildMode,
}

/// What happened to one matched feature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerOutcome {
    /// Layer written with its TOML
    Contributed {
        layer_dir: PathBuf,
        acquired: bool,
        configure_staged: bool,
    },
    /// No acquire or configure script; nothing written
    Skipped,
}

/// Build the layer for one matched feature
#[instrument(skip_all, fields(feature = %matched.full_id))]
pub fn contribute_layer(ctx: &LayerContext<'_>, matched: &MatchedFeature<'_>) -> Result<LayerOutcome> {
    let feature = matched.feature;
    let layer_dir = ctx.layers_dir.join(&feature.id);
    fs::create_dir_all(&layer_dir).map_err(|e| DevpackerError::io(&layer_dir, e))?;

    let mut selections = matched.option_selections(ctx.mode);
    selections.insert(
        TARGET_PATH_OPTION.to_string(),
        layer_dir.display().to_string(),
    );
    let script_env = feature.build_environment(
        &selections,
        &[
            ("PROFILE_D", layer_dir.join("profile.d").display().to_string()),
            (
                "ENTRYPOINT_D",
                layer_dir.join("entrypoint.d").display().to_string(),
            ),
        ],
    );

    let acquired = match FeatureScript::find(feature.script_path(ctx.buildpack_dir, "acquire")) {
        Some(script) => {
            script
                .envs(&script_env)
                .current_dir(ctx.app_dir)
                .run_checked()?;
            true
        }
        None => false,
    };

    let configure_staged = if feature
        .script_path(ctx.buildpack_dir, "configure")
        .is_file()
    {
        stage_configure(ctx.buildpack_dir, &layer_dir, &feature.id, &script_env)?;
        true
    } else {
        false
    };

    if !acquired && !configure_staged {
        info!("Skipping {}: no acquire or configure script", matched.full_id);
        fs::remove_dir_all(&layer_dir).map_err(|e| DevpackerError::io(&layer_dir, e))?;
        return Ok(LayerOutcome::Skipped);
    }

    let layer_toml = LayerToml {
        types: matched.layer_types(),
        metadata: FeatureLayerData {
            feature: LayerFeatureMetadata {
                id: matched.full_id.clone(),
                version: ctx.settings.version.clone(),
                config: feature.clone(),
                option_selections: selections,
            },
        },
    };
    write_toml(&ctx.layers_dir.join(format!("{}.toml", feature.id)), &layer_toml)?;
    write_layer_env(&layer_dir, &feature.container_env)?;

    info!(
        "Contributed layer {} (build={}, launch={}, cache={})",
        layer_dir.display(),
        layer_toml.types.build,
        layer_toml.types.launch,
        layer_toml.types.cache
    );
    Ok(LayerOutcome::Contributed {
        layer_dir,
        acquired,
        configure_staged,
    })
}

/// Copy the feature and `common/` into the layer for post-processing, with
/// the script environment as a sourceable env file
fn stage_configure(
    buildpack_dir: &Path,
    layer_dir: &Path,
    feature_id: &str,
    script_env: &IndexMap<String, String>,
) -> Result<()> {
    let config_root = layer_dir
        .join(DEV_CONTAINER_CONFIG_RELATIVE_ROOT)
        .join("feature-config");
    let feature_dir = config_root.join("features").join(feature_id);
    debug!("Staging configure script in {}", feature_dir.display());

    copy_dir_all(&buildpack_dir.join("features").join(feature_id), &feature_dir)?;
    copy_if_exists(&buildpack_dir.join("common"), &config_root.join("common"))?;

    let contents: String = script_env
        .iter()
        .map(|(k, v)| format!("{}={}\n", k, shell_words::quote(v)))
        .collect();
    write_file(&feature_dir.join(FEATURE_ENV_FILENAME), contents, 0o644)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnb::{read_toml, LayerTypes};
    use crate::features::{FeatureConfig, OptionSpec};
    use crate::script::test_support::write_script;
    use tempfile::TempDir;

    struct Fixture {
        root: TempDir,
        settings: DevpackSettings,
    }

    impl Fixture {
        fn new() -> Self {
            let root = TempDir::new().unwrap();
            for dir in ["bp", "app", "layers"] {
                fs::create_dir_all(root.path().join(dir)).unwrap();
            }
            Self {
                root,
                settings: DevpackSettings {
                    publisher: "pub".to_string(),
                    feature_set: "set".to_string(),
                    version: "0.1.0".to_string(),
                    ..Default::default()
                },
            }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.root.path().join(name)
        }
    }

    fn go_feature() -> FeatureConfig {
        let mut options = IndexMap::new();
        options.insert("version".to_string(), OptionSpec::default());
        let mut container_env = IndexMap::new();
        container_env.insert("PATH".to_string(), "/usr/local/go/bin:${PATH}".to_string());
        FeatureConfig {
            id: "go".to_string(),
            options,
            container_env,
            ..Default::default()
        }
    }

    fn matched<'a>(feature: &'a FeatureConfig, metadata: &str) -> MatchedFeature<'a> {
        MatchedFeature {
            feature,
            full_id: format!("pub/set/{}", feature.id),
            metadata: toml::from_str(metadata).unwrap(),
        }
    }

    #[test]
    fn test_contribute_with_acquire_and_configure() {
        let fx = Fixture::new();
        let (bp, app, layers) = (fx.path("bp"), fx.path("app"), fx.path("layers"));
        write_script(
            &bp.join("features/go/bin/acquire"),
            "mkdir -p \"$_BUILD_ARG_GO_TARGETPATH/bin\" && echo \"$_BUILD_ARG_GO_VERSION\" > \"$_BUILD_ARG_GO_TARGETPATH/bin/version\" && echo \"$_BUILD_ARG_GO_PROFILE_D\" > profile_d",
        );
        write_script(&bp.join("features/go/bin/configure"), "exit 0");
        fs::create_dir_all(bp.join("common")).unwrap();
        fs::write(bp.join("common/utils.sh"), "true").unwrap();

        let feature = go_feature();
        let ctx = LayerContext {
            buildpack_dir: &bp,
            app_dir: &app,
            layers_dir: &layers,
            settings: &fx.settings,
            mode: BuildMode::Production,
        };
        let outcome = contribute_layer(
            &ctx,
            &matched(&feature, "option_version = \"1.19\"\nlaunch = false"),
        )
        .unwrap();

        let layer_dir = layers.join("go");
        assert_eq!(
            outcome,
            LayerOutcome::Contributed {
                layer_dir: layer_dir.clone(),
                acquired: true,
                configure_staged: true
            }
        );
        assert_eq!(
            fs::read_to_string(layer_dir.join("bin/version")).unwrap().trim(),
            "1.19"
        );
        assert_eq!(
            fs::read_to_string(app.join("profile_d")).unwrap().trim(),
            layer_dir.join("profile.d").display().to_string()
        );

        let staged = layer_dir.join("etc/dev-container-features/feature-config");
        assert!(staged.join("features/go/bin/configure").is_file());
        assert!(staged.join("common/utils.sh").is_file());
        let env_file = fs::read_to_string(staged.join("features/go").join(FEATURE_ENV_FILENAME)).unwrap();
        assert!(env_file.contains("_BUILD_ARG_GO=true\n"));
        assert!(env_file.contains("_BUILD_ARG_GO_VERSION=1.19\n"));
        assert!(env_file.contains("_BUILD_ARG_GO_BUILDMODE=production\n"));

        let layer_toml: LayerToml = read_toml(&layers.join("go.toml")).unwrap();
        assert_eq!(
            layer_toml.types,
            LayerTypes {
                build: true,
                launch: false,
                cache: true
            }
        );
        let metadata = layer_toml.metadata.feature;
        assert_eq!(metadata.id, "pub/set/go");
        assert_eq!(metadata.version, "0.1.0");
        assert_eq!(metadata.config.id, "go");
        assert_eq!(metadata.option_selections["version"], "1.19");
        assert_eq!(
            metadata.option_selections["targetPath"],
            layer_dir.display().to_string()
        );

        assert_eq!(
            fs::read_to_string(layer_dir.join("env/PATH.prepend")).unwrap(),
            "/usr/local/go/bin:"
        );
    }

    #[test]
    fn test_null_settings_do_not_break_layer_toml() {
        let fx = Fixture::new();
        let (bp, app, layers) = (fx.path("bp"), fx.path("app"), fx.path("layers"));
        write_script(&bp.join("features/go/bin/acquire"), "exit 0");
        let feature: FeatureConfig = serde_json::from_str(
            r#"{
                "id": "go",
                "options": {"version": {"type": "string", "default": ["1.19", null]}},
                "settings": {
                    "go.gopath": null,
                    "go.tools": ["gopls", null],
                    "go.lint": {"enabled": true, "flags": null}
                }
            }"#,
        )
        .unwrap();
        let ctx = LayerContext {
            buildpack_dir: &bp,
            app_dir: &app,
            layers_dir: &layers,
            settings: &fx.settings,
            mode: BuildMode::Production,
        };

        let outcome = contribute_layer(&ctx, &matched(&feature, "")).unwrap();
        assert!(matches!(outcome, LayerOutcome::Contributed { acquired: true, .. }));

        let layer_toml: LayerToml = read_toml(&layers.join("go.toml")).unwrap();
        let config = layer_toml.metadata.feature.config;
        assert!(!config.settings.contains_key("go.gopath"));
        assert_eq!(config.settings["go.tools"], serde_json::json!(["gopls"]));
        assert_eq!(config.settings["go.lint"], serde_json::json!({"enabled": true}));
        assert_eq!(
            config.options["version"].default,
            Some(serde_json::json!(["1.19"]))
        );
    }

    #[test]
    fn test_no_scripts_skips_layer() {
        let fx = Fixture::new();
        let (bp, app, layers) = (fx.path("bp"), fx.path("app"), fx.path("layers"));
        let feature = go_feature();
        let ctx = LayerContext {
            buildpack_dir: &bp,
            app_dir: &app,
            layers_dir: &layers,
            settings: &fx.settings,
            mode: BuildMode::Production,
        };

        let outcome = contribute_layer(&ctx, &matched(&feature, "")).unwrap();
        assert_eq!(outcome, LayerOutcome::Skipped);
        assert!(!layers.join("go").exists());
        assert!(!layers.join("go.toml").exists());
    }

    #[test]
    fn test_acquire_failure_is_fatal() {
        let fx = Fixture::new();
        let (bp, app, layers) = (fx.path("bp"), fx.path("app"), fx.path("layers"));
        write_script(&bp.join("features/go/bin/acquire"), "exit 2");
        let feature = go_feature();
        let ctx = LayerContext {
            buildpack_dir: &bp,
            app_dir: &app,
            layers_dir: &layers,
            settings: &fx.settings,
            mode: BuildMode::Production,
        };

        let err = contribute_layer(&ctx, &matched(&feature, "")).unwrap_err();
        assert!(err.to_string().contains("non-zero exit code: 2"));
        assert!(!layers.join("go.toml").exists());
    }
}
