// tests/process_execution.rs
#![cfg(unix)]

mod common;
use crate::common::builders::{FlowDefinitionBuilder, TaskDefinitionBuilder};
use crate::common::{init_tracing, next_finished, with_timeout};

use std::collections::BTreeMap;
use std::error::Error;
use std::time::{Duration, Instant};

use tempfile::tempdir;

use batchflow::bus::FlowFinished;
use batchflow::engine::{CancelToken, RunnableTask, RuntimeOptions, TaskOutcome};
use batchflow::exec::{ExecutorBackend, ProcessBackend};
use batchflow::{InstanceId, SchedulerRuntime, TaskState};

type TestResult = Result<(), Box<dyn Error>>;

fn task(command: &str) -> RunnableTask {
    RunnableTask {
        instance_id: InstanceId::new(),
        task_url: "/t/leaf".to_string(),
        command: command.to_string(),
        cancel: CancelToken::new(),
    }
}

#[tokio::test]
async fn exit_codes_map_to_outcomes() {
    init_tracing();
    let backend = ProcessBackend::new();

    assert_eq!(backend.execute(&task("true")).await, TaskOutcome::Success);
    assert_eq!(backend.execute(&task("exit 3")).await, TaskOutcome::Failed(3));
    assert_eq!(
        backend.execute(&task("echo out; echo err >&2; false")).await,
        TaskOutcome::Failed(1)
    );
}

#[tokio::test]
async fn working_dir_and_env_are_applied() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    std::fs::write(dir.path().join("marker"), "x")?;

    let mut env = BTreeMap::new();
    env.insert("BATCH_ENV".to_string(), "prod".to_string());
    let backend = ProcessBackend::new()
        .with_working_dir(dir.path())
        .with_env(env);

    let outcome = backend
        .execute(&task(r#"test -f marker && test "$BATCH_ENV" = prod"#))
        .await;
    assert_eq!(outcome, TaskOutcome::Success);
    Ok(())
}

#[tokio::test]
async fn cancellation_kills_the_process() {
    init_tracing();
    let backend = ProcessBackend::new();
    let t = task("sleep 30");

    let cancel = t.cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let started = Instant::now();
    let outcome = with_timeout(backend.execute(&t)).await;
    assert_eq!(outcome, TaskOutcome::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn missing_working_dir_is_a_spawn_failure() {
    init_tracing();
    let backend = ProcessBackend::new().with_working_dir("/definitely/not/here/batchflow");
    assert_eq!(backend.execute(&task("true")).await, TaskOutcome::Failed(-1));
}

#[tokio::test]
async fn shell_flow_runs_end_to_end() -> TestResult {
    init_tracing();
    let dir = tempdir()?;

    // Each leaf appends its name; `check` verifies the order constraints.
    let flow = FlowDefinitionBuilder::new("nightly")
        .group("extract", "nightly")
        .leaf("users", "extract", "echo users >> log")
        .leaf("orders", "extract", "echo orders >> log")
        .with(
            "load",
            TaskDefinitionBuilder::leaf("nightly", "echo load >> log").depends("extract"),
        )
        .with(
            "check",
            TaskDefinitionBuilder::leaf("nightly", "test \"$(tail -n 1 log)\" = load")
                .depends("load"),
        )
        .build_flow();

    let runtime = SchedulerRuntime::start(
        RuntimeOptions {
            workers: 2,
            ..RuntimeOptions::default()
        },
        ProcessBackend::new().with_working_dir(dir.path()),
    );
    let (_, mut finished_rx) = runtime.bus().subscribe_channel::<FlowFinished>();

    runtime.launch(flow).await?;
    let finished = next_finished(&mut finished_rx).await;
    assert_eq!(finished.final_state, TaskState::Complete, "{finished:?}");

    let log = std::fs::read_to_string(dir.path().join("log"))?;
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2], "load");

    runtime.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn shell_failure_reports_failing_leaf() -> TestResult {
    init_tracing();

    let flow = FlowDefinitionBuilder::new("f")
        .leaf("ok", "f", "true")
        .leaf("broken", "f", "exit 7")
        .build_flow();

    let runtime = SchedulerRuntime::start(RuntimeOptions::default(), ProcessBackend::new());
    let (_, mut finished_rx) = runtime.bus().subscribe_channel::<FlowFinished>();

    runtime.launch(flow).await?;
    let finished = next_finished(&mut finished_rx).await;
    assert_eq!(finished.final_state, TaskState::Failed);
    assert_eq!(finished.failed_task_url.as_deref(), Some("/f/broken"));

    runtime.shutdown().await?;
    Ok(())
}
