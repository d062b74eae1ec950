// src/engine/instance.rs

use serde::Serialize;

use crate::dag::{Flow, TaskId};
use crate::engine::cancel::CancelToken;
use crate::types::{InstanceId, TaskState};

/// One launched execution of a flow, owned by the core registry.
#[derive(Debug)]
pub struct FlowInstance {
    pub id: InstanceId,
    pub flow: Flow,
    pub cancel: CancelToken,
}

impl FlowInstance {
    pub fn new(flow: Flow) -> Self {
        Self {
            id: InstanceId::new(),
            flow,
            cancel: CancelToken::new(),
        }
    }

    pub fn root_url(&self) -> &str {
        self.flow.root_url()
    }

    pub fn root_state(&self) -> TaskState {
        self.flow.root().state
    }

    /// The root reached COMPLETE or FAILED; nothing more will run.
    pub fn is_finished(&self) -> bool {
        self.root_state().is_terminal()
    }

    pub fn state_of(&self, task: TaskId) -> TaskState {
        self.flow.tree().task(task).state
    }

    pub fn snapshot(&self) -> InstanceSnapshot {
        InstanceSnapshot {
            instance_id: self.id,
            root_url: self.root_url().to_string(),
            tasks: self
                .flow
                .tree()
                .iter()
                .map(|t| TaskSnapshot {
                    url: t.url.clone(),
                    kind: t.kind.name(),
                    state: t.state,
                })
                .collect(),
        }
    }
}

/// Point-in-time view of an instance's task states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceSnapshot {
    pub instance_id: InstanceId,
    pub root_url: String,
    /// Tasks in breadth-first tree order, root first.
    pub tasks: Vec<TaskSnapshot>,
}

impl InstanceSnapshot {
    pub fn state_of(&self, url: &str) -> Option<TaskState> {
        self.tasks.iter().find(|t| t.url == url).map(|t| t.state)
    }

    pub fn root_state(&self) -> Option<TaskState> {
        self.state_of(&self.root_url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSnapshot {
    pub url: String,
    pub kind: &'static str,
    pub state: TaskState,
}
