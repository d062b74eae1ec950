// tests/pull_mode.rs

mod common;
use crate::common::builders::{FlowDefinitionBuilder, five_task_flow};
use crate::common::{init_tracing, next_finished};

use std::error::Error;

use batchflow::bus::FlowFinished;
use batchflow::engine::RuntimeOptions;
use batchflow::errors::{EngineError, LaunchError};
use batchflow::{SchedulerRuntime, TaskState};

type TestResult = Result<(), Box<dyn Error>>;

/// Urls currently handed out by the pull interface, sorted.
fn drain(runtime: &SchedulerRuntime) -> Vec<String> {
    let mut urls: Vec<String> = std::iter::from_fn(|| runtime.next_runnable_task())
        .map(|t| t.task_url)
        .collect();
    urls.sort();
    urls
}

#[tokio::test]
async fn pull_interface_hands_out_tasks_as_they_become_eligible() -> TestResult {
    init_tracing();

    let runtime = SchedulerRuntime::start_pull_mode(RuntimeOptions::default());
    let (_, mut finished_rx) = runtime.bus().subscribe_channel::<FlowFinished>();
    let id = runtime.launch(five_task_flow("true").build_flow()).await?;

    assert_eq!(drain(&runtime), vec!["/f/A", "/f/B"]);

    runtime.report_outcome("/f/A", true).await?;
    assert!(drain(&runtime).is_empty());

    runtime.report_outcome("/f/B", true).await?;
    assert_eq!(drain(&runtime), vec!["/f/C", "/f/D"]);

    runtime.report_outcome("/f/D", true).await?;
    runtime.report_outcome("/f/C", true).await?;
    assert_eq!(drain(&runtime), vec!["/f/E"]);

    runtime.report_outcome("/f/E", true).await?;
    let finished = next_finished(&mut finished_rx).await;
    assert_eq!(finished.instance_id, id);
    assert_eq!(finished.final_state, TaskState::Complete);

    let snapshot = runtime.snapshot(id).await?;
    assert!(snapshot.tasks.iter().all(|t| t.state == TaskState::Complete));

    runtime.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn conflict_does_not_duplicate_queue_entries() -> TestResult {
    init_tracing();

    let runtime = SchedulerRuntime::start_pull_mode(RuntimeOptions::default());
    let flow = five_task_flow("true").build_flow();

    runtime.launch(flow.clone()).await?;
    assert!(matches!(
        runtime.launch(flow).await,
        Err(LaunchError::Conflict { .. })
    ));

    assert_eq!(drain(&runtime), vec!["/f/A", "/f/B"]);

    runtime.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn failed_outcome_fails_flow_and_discards_queued_tasks() -> TestResult {
    init_tracing();

    let runtime = SchedulerRuntime::start_pull_mode(RuntimeOptions::default());
    let (_, mut finished_rx) = runtime.bus().subscribe_channel::<FlowFinished>();
    runtime.launch(five_task_flow("true").build_flow()).await?;

    // Only A is taken; B stays queued.
    let a = runtime.next_runnable_task().expect("A should be runnable");
    assert_eq!(a.task_url, "/f/A");

    runtime.report_outcome("/f/A", false).await?;
    let finished = next_finished(&mut finished_rx).await;
    assert_eq!(finished.final_state, TaskState::Failed);
    assert_eq!(finished.failed_task_url.as_deref(), Some("/f/A"));

    assert!(a.is_cancelled());
    assert!(runtime.next_runnable_task().is_none());

    runtime.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn reports_for_unknown_flows_are_rejected() -> TestResult {
    init_tracing();

    let runtime = SchedulerRuntime::start_pull_mode(RuntimeOptions::default());
    runtime
        .launch(FlowDefinitionBuilder::new("f").leaf("A", "f", "true").build_flow())
        .await?;

    assert_eq!(
        runtime.report_outcome("/nope/A", true).await,
        Err(EngineError::UnknownTask("/nope/A".to_string()))
    );
    // Unknown task of a known flow: accepted and ignored.
    runtime.report_outcome("/f/missing", true).await?;

    runtime.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn report_before_handout_neither_completes_nor_dequeues_the_task() -> TestResult {
    init_tracing();

    let runtime = SchedulerRuntime::start_pull_mode(RuntimeOptions::default());
    let id = runtime.launch(five_task_flow("true").build_flow()).await?;

    // A is queued but nobody took it yet.
    runtime.report_outcome("/f/A", true).await?;
    let snapshot = runtime.snapshot(id).await?;
    assert_eq!(snapshot.state_of("/f/A"), Some(TaskState::Standby));

    // A is still handed out exactly once, and only now can it finish.
    assert_eq!(drain(&runtime), vec!["/f/A", "/f/B"]);
    runtime.report_outcome("/f/A", true).await?;
    let snapshot = runtime.snapshot(id).await?;
    assert_eq!(snapshot.state_of("/f/A"), Some(TaskState::Complete));
    assert!(drain(&runtime).is_empty());

    runtime.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn in_flight_report_after_failure_is_ignored() -> TestResult {
    init_tracing();

    let runtime = SchedulerRuntime::start_pull_mode(RuntimeOptions::default());
    let (_, mut finished_rx) = runtime.bus().subscribe_channel::<FlowFinished>();
    let id = runtime.launch(five_task_flow("true").build_flow()).await?;

    assert_eq!(drain(&runtime), vec!["/f/A", "/f/B"]);
    runtime.report_outcome("/f/A", false).await?;
    let finished = next_finished(&mut finished_rx).await;
    assert_eq!(finished.final_state, TaskState::Failed);

    // B was still running when the flow failed.
    runtime.report_outcome("/f/B", true).await?;
    let snapshot = runtime.snapshot(id).await?;
    assert_eq!(snapshot.state_of("/f/B"), Some(TaskState::Running));

    runtime.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn stale_report_does_not_leak_into_a_relaunch() -> TestResult {
    init_tracing();

    let runtime = SchedulerRuntime::start_pull_mode(RuntimeOptions::default());
    let (_, mut finished_rx) = runtime.bus().subscribe_channel::<FlowFinished>();
    let flow = five_task_flow("true").build_flow();

    let first = runtime.launch(flow.clone()).await?;
    let a = runtime.next_runnable_task().expect("A should be runnable");
    let b = runtime.next_runnable_task().expect("B should be runnable");
    assert_eq!((a.task_url.as_str(), b.task_url.as_str()), ("/f/A", "/f/B"));
    runtime.report_task_outcome(&a, false).await?;
    next_finished(&mut finished_rx).await;

    let second = runtime.launch(flow).await?;
    assert_ne!(first, second);

    // Old B reports by url and by instance; the new B is untouched.
    runtime.report_outcome("/f/B", true).await?;
    runtime.report_task_outcome(&b, true).await?;
    let snapshot = runtime.snapshot(second).await?;
    assert_eq!(snapshot.state_of("/f/B"), Some(TaskState::Standby));

    // C stays locked until the new B actually runs.
    assert_eq!(drain(&runtime), vec!["/f/A", "/f/B"]);

    runtime.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn bus_is_closed_after_shutdown() -> TestResult {
    init_tracing();

    let runtime = SchedulerRuntime::start_pull_mode(RuntimeOptions::default());
    let bus = runtime.bus().clone();
    runtime.shutdown().await?;

    // The bus is closed too: publishing is a silent no-op.
    bus.publish(42u32);
    assert_eq!(bus.delivered(), 0);
    Ok(())
}
