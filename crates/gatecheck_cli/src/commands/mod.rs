//! CLI commands.

pub mod probe;
pub mod run;
pub mod token;

use anyhow::{Context, Result};
use gatecheck_core::Config;
use std::path::Path;

/// Load the file given with `--config`, or `./gatecheck.toml` when present.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            Config::load(path).with_context(|| format!("Cannot load {}", path.display()))
        }
        None => Ok(Config::load_or_default(Path::new("."))?),
    }
}
