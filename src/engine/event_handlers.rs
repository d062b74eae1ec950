// src/engine/event_handlers.rs

//! Event handling logic for a single flow instance.

use tracing::{info, warn};

use crate::bus::{FlowFinished, TaskStateChanged};
use crate::engine::cancel::CancelToken;
use crate::engine::instance::FlowInstance;
use crate::engine::queue::RunnableTask;
use crate::engine::{TaskOutcome, scheduler, state_machine};
use crate::types::{InstanceId, TaskState};

/// Command produced by the pure core, to be executed by the outer IO shell
/// in order.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Publish a task transition on the bus.
    PublishStateChange(TaskStateChanged),
    /// Publish that an instance's root reached a terminal state.
    PublishFlowFinished(FlowFinished),
    /// Push a runnable leaf onto the runnable queue.
    Enqueue(RunnableTask),
    /// Kill in-flight processes of the instance and drop its queued tasks.
    CancelInstance {
        instance_id: InstanceId,
        token: CancelToken,
    },
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone, Default)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub fn proceed(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    pub fn idle() -> Self {
        Self::proceed(Vec::new())
    }

    /// Urls of the tasks this step enqueues, in order.
    pub fn enqueued_urls(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::Enqueue(task) => Some(task.task_url.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The `FlowFinished` notification of this step, if any.
    pub fn flow_finished(&self) -> Option<&FlowFinished> {
        self.commands.iter().find_map(|c| match c {
            CoreCommand::PublishFlowFinished(msg) => Some(msg),
            _ => None,
        })
    }
}

/// Arm a freshly created instance and schedule its first tasks.
pub fn handle_launch(instance: &mut FlowInstance) -> CoreStep {
    let mut commands = Vec::new();

    info!(
        instance = %instance.id,
        flow = %instance.root_url(),
        tasks = instance.flow.tree().len(),
        leaves = instance.flow.leaf_count(),
        "launching flow"
    );

    state_machine::arm(instance, &mut commands);
    let root = instance.flow.tree().root_id();
    scheduler::evaluate(instance, root, &mut commands);

    CoreStep::proceed(commands)
}

/// A worker (or pull-mode caller) began running the task.
pub fn handle_task_started(instance: &mut FlowInstance, task_url: &str) -> CoreStep {
    let mut commands = Vec::new();

    let Some(task) = instance.flow.tree().id_of(task_url) else {
        warn!(instance = %instance.id, task = %task_url, "start reported for unknown task");
        return CoreStep::idle();
    };

    if state_machine::start_leaf(instance, task, &mut commands) {
        info!(instance = %instance.id, task = %task_url, "task started");
    }

    CoreStep::proceed(commands)
}

/// A task's command finished with `outcome`.
///
/// Only a RUNNING leaf can finish. A report for a task that was never handed
/// out (still STANDBY, possibly queued) is ignored, so the queue entry stays
/// the only way to dispatch it.
pub fn handle_task_finished(
    instance: &mut FlowInstance,
    task_url: &str,
    outcome: TaskOutcome,
) -> CoreStep {
    let mut commands = Vec::new();

    let Some(task) = instance.flow.tree().id_of(task_url) else {
        warn!(instance = %instance.id, task = %task_url, "outcome reported for unknown task");
        return CoreStep::idle();
    };
    if !instance.flow.tree().task(task).is_leaf() {
        warn!(instance = %instance.id, task = %task_url, "ignoring outcome reported for a container");
        return CoreStep::idle();
    }

    let state = instance.state_of(task);
    if state != TaskState::Running {
        warn!(
            instance = %instance.id,
            task = %task_url,
            %state,
            "ignoring outcome for a task that is not running"
        );
        return CoreStep::idle();
    }

    let to = match outcome {
        TaskOutcome::Success => {
            info!(instance = %instance.id, task = %task_url, "task completed");
            TaskState::Complete
        }
        TaskOutcome::Failed(code) => {
            warn!(instance = %instance.id, task = %task_url, exit_code = code, "task failed");
            TaskState::Failed
        }
        TaskOutcome::Cancelled => {
            warn!(instance = %instance.id, task = %task_url, "task cancelled");
            TaskState::Failed
        }
    };

    state_machine::finish_task(instance, task, to, Some(task_url.to_string()), &mut commands);
    CoreStep::proceed(commands)
}

/// Force the root of a running instance to FAILED.
pub fn handle_abort(instance: &mut FlowInstance) -> CoreStep {
    let mut commands = Vec::new();

    if instance.is_finished() {
        info!(instance = %instance.id, "abort requested for a finished instance; nothing to do");
        return CoreStep::idle();
    }

    warn!(instance = %instance.id, flow = %instance.root_url(), "aborting flow");
    let root = instance.flow.tree().root_id();
    let origin = instance.root_url().to_string();
    state_machine::finish_task(instance, root, TaskState::Failed, Some(origin), &mut commands);

    CoreStep::proceed(commands)
}
