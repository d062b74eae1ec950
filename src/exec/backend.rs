// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! Workers hand each runnable task to an `ExecutorBackend` instead of
//! spawning processes themselves. This makes it easy to swap in a fake
//! executor in tests while keeping the production implementation in
//! [`ProcessBackend`].

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::config::ExecutorSection;
use crate::engine::{RunnableTask, TaskOutcome};

use super::task_runner::{ProcessSettings, run_task};

/// Trait abstracting how a runnable task is executed.
///
/// One backend is shared by every worker of a pool, so implementations take
/// `&self` and must be `Sync`.
pub trait ExecutorBackend: Send + Sync {
    /// Run `task` to completion (or cancellation) and report the outcome.
    fn execute<'a>(
        &'a self,
        task: &'a RunnableTask,
    ) -> Pin<Box<dyn Future<Output = TaskOutcome> + Send + 'a>>;
}

/// Production backend: runs each command as a shell process.
#[derive(Debug, Clone, Default)]
pub struct ProcessBackend {
    settings: ProcessSettings,
}

impl ProcessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(section: &ExecutorSection) -> Self {
        Self {
            settings: ProcessSettings {
                working_dir: section.working_dir.clone(),
                env: section.env.clone(),
            },
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.settings.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.settings.env.extend(env);
        self
    }

    pub fn settings(&self) -> &ProcessSettings {
        &self.settings
    }
}

impl ExecutorBackend for ProcessBackend {
    fn execute<'a>(
        &'a self,
        task: &'a RunnableTask,
    ) -> Pin<Box<dyn Future<Output = TaskOutcome> + Send + 'a>> {
        Box::pin(run_task(task, &self.settings))
    }
}
