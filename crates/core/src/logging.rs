//! Logging setup
//!
//! Installs a `tracing` subscriber writing to stderr in either text or JSON.
//! Stdout stays free for command output, and under the buildpack lifecycle
//! both streams end up in the build log anyway.
//!
//! ## Environment Variables
//!
//! * `DEVPACKER_LOG_FORMAT` - `json` for JSON lines, anything else for text
//! * `DEVPACKER_LOG` - filter directives (e.g. `devpacker_core=debug`)
//! * `RUST_LOG` - fallback filter when `DEVPACKER_LOG` is unset

use anyhow::Result;
use std::{io, sync::Once};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable selecting the log format
pub const LOG_FORMAT_ENV: &str = "DEVPACKER_LOG_FORMAT";
/// Environment variable holding filter directives
pub const LOG_FILTER_ENV: &str = "DEVPACKER_LOG";

static INIT: Once = Once::new();

/// Initialize logging.
///
/// `format` wins over `DEVPACKER_LOG_FORMAT`; unknown values mean text.
/// Calling this more than once is a no-op.
pub fn init(format: Option<&str>) -> Result<()> {
    INIT.call_once(|| {
        let filter = create_env_filter(None);

        let env_format = std::env::var(LOG_FORMAT_ENV).ok();
        let effective_format = format.or(env_format.as_deref()).unwrap_or("text");

        match effective_format {
            "json" => {
                tracing_subscriber::registry()
                    .with(
                        fmt::layer()
                            .json()
                            .with_target(true)
                            .with_writer(io::stderr),
                    )
                    .with(filter)
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(
                        fmt::layer()
                            .with_target(false)
                            .without_time()
                            .with_writer(io::stderr),
                    )
                    .with(filter)
                    .init();
            }
        }

        tracing::debug!("Logging initialized with format: {}", effective_format);
    });

    Ok(())
}

/// Build the filter from an explicit directive, `DEVPACKER_LOG`, `RUST_LOG` or `info`
fn create_env_filter(directive: Option<&str>) -> EnvFilter {
    let configured = directive
        .map(str::to_string)
        .or_else(|| std::env::var(LOG_FILTER_ENV).ok());

    match configured {
        Some(directives) => EnvFilter::try_new(&directives).unwrap_or_else(|_| {
            eprintln!(
                "Invalid log filter '{}', using default 'info'",
                directives
            );
            EnvFilter::new("info")
        }),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

/// Check if logging has been initialized
pub fn is_initialized() -> bool {
    INIT.is_completed()
}
