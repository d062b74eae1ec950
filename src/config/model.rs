// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::engine::RuntimeOptions;
use crate::exec::default_worker_count;

/// Runner configuration as read from a TOML file, before validation.
///
/// ```toml
/// [executor]
/// workers = 4
/// working_dir = "/srv/jobs"
///
/// [executor.env]
/// BATCH_ENV = "prod"
///
/// [runtime]
/// retire_finished = true
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawRunnerConfig {
    #[serde(default)]
    pub executor: ExecutorSection,

    #[serde(default)]
    pub runtime: RuntimeSection,
}

/// `[executor]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorSection {
    /// Number of concurrent workers. Defaults to the available parallelism.
    #[serde(default = "default_worker_count")]
    pub workers: usize,

    /// Directory commands run in. Defaults to the current directory.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Extra environment variables for every command.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            workers: default_worker_count(),
            working_dir: None,
            env: BTreeMap::new(),
        }
    }
}

/// `[runtime]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeSection {
    /// Drop finished instances from the registry automatically.
    #[serde(default)]
    pub retire_finished: bool,
}

/// Validated runner configuration.
///
/// Only obtainable through validation (`TryFrom<RawRunnerConfig>`) or
/// [`RunnerConfig::default`].
#[derive(Debug, Clone, Default)]
pub struct RunnerConfig {
    executor: ExecutorSection,
    runtime: RuntimeSection,
}

impl RunnerConfig {
    pub(crate) fn new_unchecked(executor: ExecutorSection, runtime: RuntimeSection) -> Self {
        Self { executor, runtime }
    }

    pub fn executor(&self) -> &ExecutorSection {
        &self.executor
    }

    pub fn runtime(&self) -> &RuntimeSection {
        &self.runtime
    }

    /// Override the worker count (e.g. from the command line). Zero is
    /// ignored.
    pub fn with_workers(mut self, workers: usize) -> Self {
        if workers > 0 {
            self.executor.workers = workers;
        }
        self
    }

    pub fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions {
            retire_finished: self.runtime.retire_finished,
            workers: self.executor.workers,
        }
    }
}
