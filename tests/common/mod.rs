#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::UnboundedReceiver;

use batchflow::TaskState;
use batchflow::bus::{FlowFinished, MessageBus, TaskStateChanged};

pub use batchflow_test_utils::builders;
pub use batchflow_test_utils::{init_tracing, with_timeout};

/// Every `(task url, new state)` published on `bus`, in publish order.
pub type Transitions = Arc<Mutex<Vec<(String, TaskState)>>>;

pub fn record_transitions(bus: &MessageBus) -> Transitions {
    let seen: Transitions = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.subscribe(move |msg: &TaskStateChanged| {
        sink.lock().unwrap().push((msg.task_url.clone(), msg.new_state));
        Ok(())
    });
    seen
}

/// Index of the first `(url, state)` transition; panics if it never happened.
pub fn position(transitions: &Transitions, url: &str, state: TaskState) -> usize {
    transitions
        .lock()
        .unwrap()
        .iter()
        .position(|(u, s)| u == url && *s == state)
        .unwrap_or_else(|| panic!("no transition of {url} to {state}"))
}

pub fn reached(transitions: &Transitions, url: &str, state: TaskState) -> bool {
    transitions
        .lock()
        .unwrap()
        .iter()
        .any(|(u, s)| u == url && *s == state)
}

/// Wait (bounded) for the next `FlowFinished`.
pub async fn next_finished(rx: &mut UnboundedReceiver<FlowFinished>) -> FlowFinished {
    with_timeout(rx.recv())
        .await
        .expect("bus closed before the flow finished")
}
