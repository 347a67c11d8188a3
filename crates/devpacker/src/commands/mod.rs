//! Command implementations
//!
//! This module contains implementations for all CLI subcommands.

pub mod build;
pub mod finalize;
pub mod generate;
pub mod internal;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// `path`, or the current directory when none was given
pub(crate) fn folder_or_cwd(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => std::env::current_dir().context("Unable to get current working directory"),
    }
}
