// src/bus/messages.rs

//! Messages the scheduler publishes for observers.

use serde::Serialize;

use crate::types::{InstanceId, TaskState};

/// A task of a running instance changed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskStateChanged {
    pub instance_id: InstanceId,
    pub task_url: String,
    pub old_state: TaskState,
    pub new_state: TaskState,
}

/// The root of an instance reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowFinished {
    pub instance_id: InstanceId,
    pub root_url: String,
    pub final_state: TaskState,
    /// Url of the task whose failure ended the flow (the root url for an
    /// abort); `None` when the flow completed.
    pub failed_task_url: Option<String>,
}

impl FlowFinished {
    pub fn succeeded(&self) -> bool {
        self.final_state == TaskState::Complete
    }
}
