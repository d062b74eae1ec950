// src/engine/state_machine.rs

//! Task state transitions and upward propagation of terminal states.
//!
//! Every accepted transition is recorded as a `PublishStateChange` command
//! before any command it causes (enqueueing successors, finishing the
//! parent, cancelling the instance), so observers see causes before effects.

use tracing::{debug, info, warn};

use crate::bus::{FlowFinished, TaskStateChanged};
use crate::dag::TaskId;
use crate::engine::event_handlers::CoreCommand;
use crate::engine::instance::FlowInstance;
use crate::engine::scheduler;
use crate::types::TaskState;

/// Whether `from -> to` is a legal task transition.
///
/// `STANDBY -> FAILED` only happens when a root that never started is
/// aborted.
pub fn is_legal(from: TaskState, to: TaskState) -> bool {
    use TaskState::*;
    matches!(
        (from, to),
        (Inactive, Standby)
            | (Standby, Running)
            | (Running, Complete)
            | (Running, Failed)
            | (Standby, Failed)
    )
}

/// Apply a transition, recording it for publication. Illegal transitions are
/// logged and leave the task untouched.
pub(crate) fn transition(
    instance: &mut FlowInstance,
    task: TaskId,
    to: TaskState,
    out: &mut Vec<CoreCommand>,
) -> bool {
    let instance_id = instance.id;
    let node = instance.flow.tree_mut().task_mut(task);
    let from = node.state;

    if !is_legal(from, to) {
        warn!(
            instance = %instance_id,
            task = %node.url,
            %from,
            %to,
            "rejecting illegal state transition"
        );
        return false;
    }

    node.state = to;
    debug!(instance = %instance_id, task = %node.url, %from, %to, "task state changed");
    out.push(CoreCommand::PublishStateChange(TaskStateChanged {
        instance_id,
        task_url: node.url.clone(),
        old_state: from,
        new_state: to,
    }));
    true
}

/// Move every task of a fresh instance to STANDBY and initialise container
/// counters.
pub(crate) fn arm(instance: &mut FlowInstance, out: &mut Vec<CoreCommand>) {
    let ids: Vec<TaskId> = instance.flow.tree().ids().collect();
    for id in ids {
        let node = instance.flow.tree_mut().task_mut(id);
        node.unfinished_children = node.children.len();
        node.scheduled = false;
        node.failure_origin = None;
        transition(instance, id, TaskState::Standby, out);
    }
}

/// Mark a scheduled leaf RUNNING, starting any ancestor still in STANDBY
/// first (outermost ancestor first).
pub(crate) fn start_leaf(
    instance: &mut FlowInstance,
    leaf: TaskId,
    out: &mut Vec<CoreCommand>,
) -> bool {
    let node = instance.flow.tree().task(leaf);
    if node.state != TaskState::Standby || !node.scheduled {
        warn!(
            instance = %instance.id,
            task = %node.url,
            state = %node.state,
            scheduled = node.scheduled,
            "ignoring start report for a task that is not waiting to run"
        );
        return false;
    }

    let mut chain = Vec::new();
    let mut cursor = instance.flow.tree().parent_of(leaf);
    while let Some(ancestor) = cursor {
        chain.push(ancestor);
        cursor = instance.flow.tree().parent_of(ancestor);
    }
    for &ancestor in chain.iter().rev() {
        if instance.state_of(ancestor) == TaskState::Standby {
            transition(instance, ancestor, TaskState::Running, out);
        }
    }

    transition(instance, leaf, TaskState::Running, out)
}

/// Move `task` to a terminal state and propagate the consequence upwards.
///
/// `origin` is the url of the task whose failure caused this one; it is
/// ignored when `to` is COMPLETE.
pub(crate) fn finish_task(
    instance: &mut FlowInstance,
    task: TaskId,
    to: TaskState,
    origin: Option<String>,
    out: &mut Vec<CoreCommand>,
) {
    if !transition(instance, task, to, out) {
        return;
    }
    if to == TaskState::Failed {
        instance.flow.tree_mut().task_mut(task).failure_origin = origin.clone();
    }

    match instance.flow.tree().parent_of(task) {
        None => root_finished(instance, out),
        Some(parent) => child_finished(instance, parent, task, to, origin, out),
    }
}

fn child_finished(
    instance: &mut FlowInstance,
    parent: TaskId,
    child: TaskId,
    child_state: TaskState,
    origin: Option<String>,
    out: &mut Vec<CoreCommand>,
) {
    let node = instance.flow.tree_mut().task_mut(parent);
    node.unfinished_children = node.unfinished_children.saturating_sub(1);
    let remaining = node.unfinished_children;

    if node.state.is_terminal() {
        debug!(
            instance = %instance.id,
            task = %node.url,
            "parent already terminal; child result has no further effect"
        );
        return;
    }

    if child_state == TaskState::Failed {
        finish_task(instance, parent, TaskState::Failed, origin, out);
        return;
    }

    scheduler::evaluate_successors(instance, child, out);
    if remaining == 0 {
        finish_task(instance, parent, TaskState::Complete, None, out);
    }
}

fn root_finished(instance: &mut FlowInstance, out: &mut Vec<CoreCommand>) {
    let root = instance.flow.root();
    let final_state = root.state;
    let failed_task_url = (final_state == TaskState::Failed)
        .then(|| root.failure_origin.clone().unwrap_or_else(|| root.url.clone()));

    match &failed_task_url {
        None => info!(instance = %instance.id, flow = %root.url, "flow completed"),
        Some(failed) => warn!(
            instance = %instance.id,
            flow = %root.url,
            failed_task = %failed,
            "flow failed"
        ),
    }

    out.push(CoreCommand::PublishFlowFinished(FlowFinished {
        instance_id: instance.id,
        root_url: root.url.clone(),
        final_state,
        failed_task_url,
    }));

    if final_state == TaskState::Failed {
        out.push(CoreCommand::CancelInstance {
            instance_id: instance.id,
            token: instance.cancel.clone(),
        });
    }
}
