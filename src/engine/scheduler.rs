// src/engine/scheduler.rs

//! Eligibility decisions.
//!
//! A task is eligible when it is STANDBY, has not been scheduled yet, its
//! parent scope has been activated, and every predecessor in that scope is
//! COMPLETE. Eligible leaves are enqueued exactly once; eligible containers
//! are activated on the spot, which evaluates their own children.

use tracing::debug;

use crate::dag::{TaskId, TaskKind};
use crate::engine::event_handlers::CoreCommand;
use crate::engine::instance::FlowInstance;
use crate::engine::queue::RunnableTask;
use crate::engine::state_machine;
use crate::types::TaskState;

pub fn is_eligible(instance: &FlowInstance, task: TaskId) -> bool {
    let tree = instance.flow.tree();
    let node = tree.task(task);
    if node.state != TaskState::Standby || node.scheduled {
        return false;
    }

    let scope_active = node.parent.map(|p| tree.task(p).scheduled).unwrap_or(true);
    scope_active
        && instance
            .flow
            .predecessors(task)
            .iter()
            .all(|&p| tree.task(p).state == TaskState::Complete)
}

/// Schedule `task` if it is eligible.
pub(crate) fn evaluate(instance: &mut FlowInstance, task: TaskId, out: &mut Vec<CoreCommand>) {
    if !is_eligible(instance, task) {
        return;
    }

    let node = instance.flow.tree_mut().task_mut(task);
    node.scheduled = true;
    let leaf = match &node.kind {
        TaskKind::Leaf { command } => Some((node.url.clone(), command.clone())),
        TaskKind::Flow | TaskKind::Group => None,
    };

    match leaf {
        Some((task_url, command)) => {
            debug!(instance = %instance.id, task = %task_url, "task is runnable");
            out.push(CoreCommand::Enqueue(RunnableTask {
                instance_id: instance.id,
                task_url,
                command,
                cancel: instance.cancel.clone(),
            }));
        }
        None => activate(instance, task, out),
    }
}

/// Re-evaluate the siblings that depend on `task` after it completed.
pub(crate) fn evaluate_successors(
    instance: &mut FlowInstance,
    task: TaskId,
    out: &mut Vec<CoreCommand>,
) {
    for successor in instance.flow.successors(task) {
        evaluate(instance, successor, out);
    }
}

/// Evaluate the children of an activated container, in id order.
fn activate(instance: &mut FlowInstance, container: TaskId, out: &mut Vec<CoreCommand>) {
    let children = instance.flow.tree().children_of(container).to_vec();

    if children.is_empty() {
        // Nothing to wait for: the container runs and completes at once.
        state_machine::transition(instance, container, TaskState::Running, out);
        state_machine::finish_task(instance, container, TaskState::Complete, None, out);
        return;
    }

    debug!(
        instance = %instance.id,
        task = %instance.flow.tree().task(container).url,
        children = children.len(),
        "scope activated"
    );
    for child in children {
        evaluate(instance, child, out);
    }
}
