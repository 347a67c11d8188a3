//! Core library for devpacker
//!
//! Turns a folder of dev container features into a Cloud Native Buildpack:
//! the detect and build lifecycle adapters, the generator that lays out the
//! buildpack, and the finalizer that finishes images and writes a matching
//! devcontainer.json. Also holds the shared feature model, option resolution,
//! plan reconciliation, logging, and error handling.

pub mod build;
pub mod cnb;
pub mod combinations;
pub mod constants;
pub mod detect;
pub mod devcontainer;
pub mod docker;
pub mod env;
pub mod errors;
pub mod features;
pub mod finalize;
pub mod fsutil;
pub mod generate;
pub mod logging;
pub mod options;
pub mod pack;
pub mod plan;
pub mod script;
pub mod settings;

// Re-export IndexMap for use by dependent crates (preserves insertion order for ordered maps)
pub use indexmap::IndexMap;

/// Get the version of the core library
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
