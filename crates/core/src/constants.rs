//! Names shared between the lifecycle adapters, the generated buildpack and
//! the images it produces. Changing any of these breaks already-built images.

/// Buildpack API written to buildpack.toml when the settings do not name one
pub const DEFAULT_API_VERSION: &str = "0.7";

/// buildpack.toml metadata key holding the devpack settings
pub const FEATURESET_METADATA_ID: &str = "com.microsoft.devcontainer.featureset";
/// buildpack.toml metadata key holding the ordered feature id list
pub const FEATURES_METADATA_ID: &str = "com.microsoft.devcontainer.features";
/// Layer metadata key holding a [`crate::features::LayerFeatureMetadata`]
pub const FEATURE_LAYER_METADATA_ID: &str = "com.microsoft.devcontainer.feature";
/// Image label recording the build mode
pub const BUILD_MODE_METADATA_ID: &str = "com.microsoft.devcontainer.buildmode";
/// Image label holding the space-delimited post-processing done marker
pub const POST_PROCESSING_DONE_METADATA_ID: &str = "com.microsoft.devcontainer.features.done";
/// Image label written by the buildpack lifecycle
pub const LIFECYCLE_METADATA_LABEL: &str = "io.buildpacks.lifecycle.metadata";

/// Environment variable pointing at the buildpack root
pub const BUILDPACK_DIR_ENV_VAR: &str = "CNB_BUILDPACK_DIR";
/// Environment variable overriding the build mode
pub const BUILD_MODE_ENV_VAR: &str = "BP_DCNB_BUILD_MODE";
/// Set to `false` to keep application folder contents in devcontainer mode
pub const OMIT_APP_DIR_ENV_VAR: &str = "BP_DCNB_OMIT_APP_DIR";
/// Prefix of variables handed to feature scripts
pub const OPTION_SELECTION_ENV_PREFIX: &str = "_BUILD_ARG_";
/// Prefix of user-facing (project.toml / `pack -e`) feature variables
pub const PROJECT_OPTION_SELECTION_ENV_PREFIX: &str = "BP_CONTAINER_FEATURE_";

/// Plan metadata key prefix for option selections
pub const OPTION_METADATA_KEY_PREFIX: &str = "option_";
/// Pseudo-option carrying the build mode from detect to build
pub const BUILD_MODE_OPTION: &str = "buildMode";
/// Pseudo-option carrying the layer path to acquire scripts
pub const TARGET_PATH_OPTION: &str = "targetPath";
/// Pseudo-option set from a scalar devcontainer.json feature reference
pub const VERSION_OPTION: &str = "version";
/// Additional variable telling a detect script where to write selections
pub const SELECTION_ENV_FILE_VARIABLE: &str = "SELECTION_ENV_FILE_PATH";

/// Settings file in the buildpack root
pub const DEVPACK_SETTINGS_FILENAME: &str = "devpack-settings.json";
/// Feature declaration file in the buildpack root
pub const FEATURES_JSON_FILENAME: &str = "devcontainer-features.json";
/// Suffix appended to the devcontainer.json path written by finalize
pub const DEVPACK_OUTPUT_SUFFIX: &str = ".devpack";

/// Root of per-image feature configuration, relative to `/` or a layer
pub const DEV_CONTAINER_CONFIG_RELATIVE_ROOT: &str = "etc/dev-container-features";
/// Marker file whose contents select the build mode inside a builder image
pub const CONTAINER_IMAGE_BUILD_MARKER_PATH: &str =
    "/usr/local/etc/dev-container-features/dcnb-build-mode";

/// Exit code a detect script uses for "not applicable"
pub const DETECT_NOT_DETECTED_EXIT_CODE: i32 = 100;

/// Executable name prefix of the binaries shipped inside a generated buildpack
pub const BUILDPACK_BINARY_PREFIX: &str = "devpacker-linux-";
