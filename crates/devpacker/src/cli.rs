use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use devpacker_core::settings::BuildMode;
use std::path::PathBuf;

/// Container image build mode
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ModeOption {
    /// Plain application image
    Production,
    /// Image for use as a dev container
    Devcontainer,
}

impl From<ModeOption> for BuildMode {
    fn from(mode: ModeOption) -> Self {
        match mode {
            ModeOption::Production => BuildMode::Production,
            ModeOption::Devcontainer => BuildMode::Devcontainer,
        }
    }
}

/// Log format options
#[derive(Debug, Clone, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON structured format
    Json,
}

/// Log level options
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    /// Error messages only
    Error,
    /// Warning and error messages
    Warn,
    /// Informational messages and above
    Info,
    /// Debug messages and above
    Debug,
    /// All messages including trace
    Trace,
}

/// Lifecycle phases invoked by the generated `bin/detect` and `bin/build`
#[derive(Debug, Subcommand)]
pub enum InternalPhase {
    /// CNB detect: write the build plan for the application in the current directory
    Detect {
        /// Platform directory
        platform: PathBuf,
        /// Build plan to write
        plan: PathBuf,
    },
    /// CNB build: contribute feature layers for the resolved plan
    Build {
        /// Layers directory
        layers: PathBuf,
        /// Platform directory
        platform: PathBuf,
        /// Buildpack plan to read
        plan: PathBuf,
    },
}

/// devpacker subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a buildpack from a dev container features folder
    Generate {
        /// Folder holding devcontainer-features.json, devpack-settings.json and features/
        #[arg(default_value = ".")]
        features_path: PathBuf,
        /// Where to write the buildpack
        #[arg(default_value = "out")]
        output_path: PathBuf,
    },
    /// Run `pack build`, then finalize the resulting image
    #[command(long_about = "Run `pack build`, then finalize the resulting image\n\n\
        Arguments after the image name are passed to `pack build` unchanged. \
        The application folder for finalize is taken from -p/--path, defaulting to the current directory.")]
    Build {
        /// Image name
        image: String,
        /// Arguments for `pack build`
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        pack_args: Vec<String>,
    },
    /// Post-process an image and write a devcontainer.json for it
    Finalize {
        /// Image to finalize
        image: String,
        /// Application folder holding devcontainer.json (defaults to the current directory)
        app_folder: Option<PathBuf>,
    },
    /// Buildpack lifecycle entry points
    #[command(name = "_internal", hide = true)]
    Internal {
        #[command(subcommand)]
        phase: InternalPhase,
    },
}

/// Main CLI structure
#[derive(Debug, Parser)]
#[command(
    name = "devpacker",
    version,
    about = "Dev container features as Cloud Native Buildpacks",
    long_about = "Dev container features as Cloud Native Buildpacks\n\nGenerates a buildpack from a folder of dev container features, builds images with it through pack, and finalizes them for use as dev containers.",
    color = clap::ColorChoice::Auto
)]
pub struct Cli {
    /// Override the build mode (otherwise BP_DCNB_BUILD_MODE, the builder marker file, or production)
    #[arg(long, global = true, value_enum)]
    pub mode: Option<ModeOption>,

    /// Log format (text or json, defaults to text, can be set via DEVPACKER_LOG_FORMAT env var)
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Log level
    #[arg(long, global = true, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Path to docker executable
    #[arg(long, global = true, default_value = "docker")]
    pub docker_path: String,

    /// Path to pack executable
    #[arg(long, global = true, default_value = "pack")]
    pub pack_path: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Initialize logging from the global options, then run the selected
    /// subcommand. No subcommand means `generate` with its defaults.
    pub fn dispatch(self) -> Result<()> {
        let log_format = match self.log_format {
            Some(LogFormat::Text) => Some("text"),
            Some(LogFormat::Json) => Some("json"),
            None => None,
        };
        let log_level = match self.log_level {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        if std::env::var_os(devpacker_core::logging::LOG_FILTER_ENV).is_none()
            && std::env::var_os("RUST_LOG").is_none()
        {
            std::env::set_var(
                "RUST_LOG",
                format!("devpacker={},devpacker_core={}", log_level, log_level),
            );
        }
        devpacker_core::logging::init(log_format)?;
        tracing::debug!("CLI initialized with log level: {}", log_level);

        let mode = self.mode.map(BuildMode::from);
        match self.command {
            None => {
                use crate::commands::generate::{execute_generate, GenerateArgs};
                execute_generate(GenerateArgs::default())
            }
            Some(Commands::Generate {
                features_path,
                output_path,
            }) => {
                use crate::commands::generate::{execute_generate, GenerateArgs};
                execute_generate(GenerateArgs {
                    features_path,
                    output_path,
                })
            }
            Some(Commands::Build { image, pack_args }) => {
                use crate::commands::build::{execute_pack_build, PackBuildArgs};
                execute_pack_build(PackBuildArgs {
                    image,
                    pack_args,
                    mode,
                    pack_path: self.pack_path,
                    docker_path: self.docker_path,
                })
            }
            Some(Commands::Finalize { image, app_folder }) => {
                use crate::commands::finalize::{execute_finalize, FinalizeArgs};
                execute_finalize(FinalizeArgs {
                    image,
                    app_folder,
                    mode,
                    docker_path: self.docker_path,
                })
            }
            Some(Commands::Internal { phase }) => {
                use crate::commands::internal::{execute_build, execute_detect, PhaseArgs};
                match phase {
                    InternalPhase::Detect { platform, plan } => execute_detect(PhaseArgs {
                        layers: None,
                        platform,
                        plan,
                        mode,
                    }),
                    InternalPhase::Build {
                        layers,
                        platform,
                        plan,
                    } => execute_build(PhaseArgs {
                        layers: Some(layers),
                        platform,
                        plan,
                        mode,
                    }),
                }
            }
        }
    }
}
