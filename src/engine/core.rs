// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! owns the registry of flow instances and reacts to requests and task
//! reports by producing:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from the runtime channel and answering requests
//! - publishing notifications on the bus
//! - feeding the runnable queue and cancelling instances
//!
//! The core is unit tested without Tokio, channels or processes.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::dag::Flow;
use crate::engine::event_handlers::{
    CoreStep, handle_abort, handle_launch, handle_task_finished, handle_task_started,
};
use crate::engine::instance::{FlowInstance, InstanceSnapshot};
use crate::engine::{RuntimeOptions, TaskOutcome};
use crate::errors::{EngineError, LaunchError};
use crate::types::{InstanceId, TaskState};

/// Pure core runtime state.
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug, Default)]
pub struct CoreRuntime {
    instances: HashMap<InstanceId, FlowInstance>,
    /// Root url -> its non-terminal instance.
    active_by_url: HashMap<String, InstanceId>,
    /// Root urls of every flow launched so far, retired or not.
    known_roots: HashSet<String>,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(options: RuntimeOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Register and arm a new instance of `flow`.
    ///
    /// Fails with [`LaunchError::Conflict`] when the flow's root url already
    /// has a non-terminal instance; nothing is created or enqueued then.
    pub fn launch(&mut self, flow: Flow) -> Result<(InstanceId, CoreStep), LaunchError> {
        let root_url = flow.root_url().to_string();
        if let Some(&running) = self.active_by_url.get(&root_url) {
            warn!(flow = %root_url, instance = %running, "launch rejected: flow already running");
            return Err(LaunchError::Conflict { root_url, running });
        }

        let mut instance = FlowInstance::new(flow);
        let id = instance.id;
        let step = handle_launch(&mut instance);

        self.known_roots.insert(root_url.clone());
        self.active_by_url.insert(root_url, id);
        self.instances.insert(id, instance);
        self.settle(id);

        Ok((id, step))
    }

    /// Force the instance's root to FAILED. Aborting a finished instance is
    /// a no-op.
    pub fn abort(&mut self, id: InstanceId) -> Result<CoreStep, EngineError> {
        let instance = self.instances.get_mut(&id).ok_or(EngineError::NotFound(id))?;
        let step = handle_abort(instance);
        self.settle(id);
        Ok(step)
    }

    /// Drop a finished instance from the registry.
    ///
    /// Returns `Ok(false)` while the instance is still running.
    pub fn retire(&mut self, id: InstanceId) -> Result<bool, EngineError> {
        let instance = self.instances.get(&id).ok_or(EngineError::NotFound(id))?;
        if !instance.is_finished() {
            debug!(instance = %id, "retire requested for a running instance; keeping it");
            return Ok(false);
        }
        self.instances.remove(&id);
        info!(instance = %id, "instance retired");
        Ok(true)
    }

    pub fn snapshot(&self, id: InstanceId) -> Result<InstanceSnapshot, EngineError> {
        self.instances
            .get(&id)
            .map(FlowInstance::snapshot)
            .ok_or(EngineError::NotFound(id))
    }

    pub fn task_started(&mut self, id: InstanceId, task_url: &str) -> CoreStep {
        let Some(instance) = self.running_instance(id, task_url) else {
            return CoreStep::idle();
        };
        handle_task_started(instance, task_url)
    }

    pub fn task_finished(&mut self, id: InstanceId, task_url: &str, outcome: TaskOutcome) -> CoreStep {
        let Some(instance) = self.running_instance(id, task_url) else {
            return CoreStep::idle();
        };
        let step = handle_task_finished(instance, task_url, outcome);
        self.settle(id);
        step
    }

    /// Outcome report addressed by url only.
    ///
    /// It finishes the task in the instance where that url is RUNNING. A
    /// report that matches no running task of a known flow (late reports of
    /// a finished instance, tasks never handed out) is ignored. Urls of
    /// flows never launched are rejected with [`EngineError::UnknownTask`].
    pub fn outcome_reported(&mut self, task_url: &str, success: bool) -> Result<CoreStep, EngineError> {
        if let Some(id) = self.instance_running(task_url) {
            return Ok(self.task_finished(id, task_url, TaskOutcome::from_success(success)));
        }

        if !self.known_roots.contains(&root_of(task_url)) {
            return Err(EngineError::UnknownTask(task_url.to_string()));
        }
        warn!(task = %task_url, "outcome for a task that is not running anywhere ignored");
        Ok(CoreStep::idle())
    }

    /// Outcome report addressed to one instance, as carried by a
    /// [`crate::engine::RunnableTask`]. Reports for finished or retired
    /// instances are ignored.
    pub fn instance_outcome_reported(&mut self, id: InstanceId, task_url: &str, success: bool) -> CoreStep {
        self.task_finished(id, task_url, TaskOutcome::from_success(success))
    }

    /// Abort every running instance and stop the loop.
    pub fn shutdown(&mut self) -> CoreStep {
        let running: Vec<InstanceId> = self.active_by_url.values().copied().collect();
        let mut commands = Vec::new();
        for id in running {
            if let Ok(mut step) = self.abort(id) {
                commands.append(&mut step.commands);
            }
        }
        CoreStep {
            commands,
            keep_running: false,
        }
    }

    /// Non-terminal instance of the flow named by the url's root segment.
    pub fn instance_for_url(&self, task_url: &str) -> Option<InstanceId> {
        self.active_by_url.get(&root_of(task_url)).copied()
    }

    /// Unfinished instance in which `task_url` is currently RUNNING.
    fn instance_running(&self, task_url: &str) -> Option<InstanceId> {
        let id = self.instance_for_url(task_url)?;
        let instance = self.instances.get(&id)?;
        let task = instance.flow.tree().id_of(task_url)?;
        (instance.state_of(task) == TaskState::Running).then_some(id)
    }

    pub fn instance(&self, id: InstanceId) -> Option<&FlowInstance> {
        self.instances.get(&id)
    }

    /// Number of instances whose root is not terminal yet.
    pub fn running_count(&self) -> usize {
        self.active_by_url.len()
    }

    pub fn is_idle(&self) -> bool {
        self.active_by_url.is_empty()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    fn running_instance(&mut self, id: InstanceId, task_url: &str) -> Option<&mut FlowInstance> {
        match self.instances.get_mut(&id) {
            None => {
                warn!(instance = %id, task = %task_url, "report for unknown instance ignored");
                None
            }
            Some(instance) if instance.is_finished() => {
                debug!(instance = %id, task = %task_url, "report for finished instance ignored");
                None
            }
            Some(instance) => Some(instance),
        }
    }

    /// Bookkeeping once an instance's root became terminal.
    fn settle(&mut self, id: InstanceId) {
        let Some(instance) = self.instances.get(&id) else {
            return;
        };
        if !instance.is_finished() {
            return;
        }

        if self.active_by_url.get(instance.root_url()) == Some(&id) {
            self.active_by_url.remove(instance.root_url());
        }
        if self.options.retire_finished {
            self.instances.remove(&id);
            debug!(instance = %id, "finished instance retired automatically");
        }
    }
}

fn root_of(task_url: &str) -> String {
    let root = task_url.trim_start_matches('/').split('/').next().unwrap_or_default();
    format!("/{root}")
}
