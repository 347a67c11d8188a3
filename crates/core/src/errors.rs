//! Error types and handling
//!
//! Each concern gets its own error enum (configuration, feature model, plan
//! documents, feature scripts, external CLIs). They are wrapped by
//! [`DevpackerError`] so library callers deal with a single type.

use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration document parsing error
    #[error("Failed to parse configuration file {path}: {message}")]
    Parsing { path: String, message: String },

    /// Required configuration file does not exist
    #[error("Configuration file not found: {path}")]
    NotFound { path: String },

    /// Required environment variable is unset or empty
    #[error("Required environment variable {name} is not set: {hint}")]
    MissingEnv { name: String, hint: String },

    /// Unrecognized build mode value
    #[error("Invalid build mode '{value}', expected 'production' or 'devcontainer'")]
    InvalidBuildMode { value: String },

    /// Configuration file I/O error
    #[error("Failed to read configuration file")]
    Io(#[from] std::io::Error),
}

/// Feature model errors
#[derive(Error, Debug)]
pub enum FeatureError {
    /// Feature declaration parsing error
    #[error("Failed to parse feature declarations in {path}: {message}")]
    Parsing { path: String, message: String },

    /// Feature declaration file not found
    #[error("Feature declaration file not found: {path}")]
    NotFound { path: String },

    /// Two declared features share an id
    #[error("Duplicate feature id '{id}' in feature declarations")]
    DuplicateId { id: String },

    /// Feature declaration file I/O error
    #[error("Failed to read feature declarations")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON parsing error")]
    Json(#[from] serde_json::Error),
}

/// Buildpack plan and lifecycle TOML document errors
#[derive(Error, Debug)]
pub enum PlanError {
    /// TOML document could not be decoded
    #[error("Failed to parse {path}: {message}")]
    Parsing { path: String, message: String },

    /// TOML document could not be encoded
    #[error("Failed to encode {document}: {message}")]
    Encoding { document: String, message: String },
}

/// Feature script execution errors
#[derive(Error, Debug)]
pub enum ScriptError {
    /// Script exited with a code other than success or the not-detected sentinel
    #[error("Script {script} failed with non-zero exit code: {code}")]
    NonZeroExit { script: String, code: i32 },

    /// Script was terminated without an exit code
    #[error("Script {script} was terminated by a signal")]
    Terminated { script: String },

    /// Script could not be started
    #[error("Failed to execute script {script}")]
    Spawn {
        script: String,
        #[source]
        source: std::io::Error,
    },
}

/// Docker CLI errors
#[derive(Error, Debug)]
pub enum DockerError {
    /// Docker is not installed or not accessible
    #[error("Docker is not installed or not accessible")]
    NotInstalled,

    /// Docker CLI command error
    #[error("Docker CLI error: {0}")]
    CLIError(String),
}

/// pack CLI errors
#[derive(Error, Debug)]
pub enum PackError {
    /// pack is not installed or not accessible
    #[error("pack CLI is not installed or not accessible")]
    NotInstalled,

    /// pack build failed
    #[error("pack build failed with exit code {code}")]
    BuildFailed { code: i32 },
}

/// Main error enum wrapping all domain-specific errors
#[derive(Error, Debug)]
pub enum DevpackerError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Feature model errors
    #[error("Feature error: {0}")]
    Feature(#[from] FeatureError),

    /// Plan and lifecycle document errors
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// Feature script errors
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    /// Docker CLI errors
    #[error("Docker error: {0}")]
    Docker(#[from] DockerError),

    /// pack CLI errors
    #[error("Pack error: {0}")]
    Pack(#[from] PackError),

    /// Filesystem errors outside of configuration loading
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl DevpackerError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        DevpackerError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// Convenience type alias for Results with DevpackerError
pub type Result<T> = std::result::Result<T, DevpackerError>;
