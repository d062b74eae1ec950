// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{RawRunnerConfig, RunnerConfig};
use crate::errors::Result;

/// Load a runner configuration file and return the raw, unvalidated model.
///
/// This only performs TOML deserialization. Use [`load_and_validate`] to
/// also check its invariants.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawRunnerConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let config: RawRunnerConfig = toml::from_str(&contents)?;
    debug!(path = %path.display(), "loaded runner config");
    Ok(config)
}

/// Load a runner configuration file and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<RunnerConfig> {
    let raw = load_from_path(path)?;
    RunnerConfig::try_from(raw)
}

/// Load `path` if given; otherwise use the default config file when it
/// exists, or built-in defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<RunnerConfig> {
    match path {
        Some(path) => load_and_validate(path),
        None => {
            let fallback = default_config_path();
            if fallback.is_file() {
                load_and_validate(fallback)
            } else {
                Ok(RunnerConfig::default())
            }
        }
    }
}

/// `batchflow.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("batchflow.toml")
}
