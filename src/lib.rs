// src/lib.rs

pub mod bus;
pub mod cli;
pub mod config;
pub mod dag;
pub mod definition;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

pub use dag::{Flow, FlowBuilder, validate};
pub use engine::{RuntimeOptions, SchedulerRuntime};
pub use errors::{BatchflowError, Result};
pub use types::{InstanceId, TaskState};

use anyhow::{Context, bail};
use tracing::{debug, info, warn};

use crate::bus::{FlowFinished, TaskStateChanged};
use crate::cli::CliArgs;
use crate::config::load_or_default;
use crate::definition::load_from_path;
use crate::exec::ProcessBackend;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - definition loading and validation
/// - runner config
/// - scheduler runtime, worker pool and process backend
/// - Ctrl-C handling (aborts the flow)
///
/// Returns an error when the flow does not complete.
pub async fn run(args: CliArgs) -> anyhow::Result<()> {
    let definition = load_from_path(&args.definition)
        .with_context(|| format!("loading flow definition {}", args.definition.display()))?;
    let flow = FlowBuilder::new().build(&definition)?;

    if args.dry_run {
        print_dry_run(&flow);
        return Ok(());
    }

    let config = load_or_default(args.config.as_deref())?.with_workers(args.workers.unwrap_or(0));
    let backend = ProcessBackend::from_config(config.executor());
    let runtime = SchedulerRuntime::start(config.runtime_options(), backend);

    runtime.bus().subscribe(|msg: &TaskStateChanged| {
        println!("{} {} -> {}", msg.task_url, msg.old_state, msg.new_state);
        Ok(())
    });
    let (_, mut finished_rx) = runtime.bus().subscribe_channel::<FlowFinished>();

    let instance_id = runtime.launch(flow).await?;
    info!(instance = %instance_id, "flow launched");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    let finished = loop {
        tokio::select! {
            msg = finished_rx.recv() => match msg {
                Some(msg) if msg.instance_id == instance_id => break Some(msg),
                Some(_) => continue,
                None => break None,
            },
            res = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                if let Err(e) = res {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                    continue;
                }
                warn!(instance = %instance_id, "Ctrl+C received; aborting flow");
                runtime.abort(instance_id).await?;
            }
        }
    };

    runtime.shutdown().await?;

    match finished {
        Some(msg) if msg.succeeded() => {
            println!("flow {} completed", msg.root_url);
            Ok(())
        }
        Some(msg) => bail!(
            "flow {} failed at {}",
            msg.root_url,
            msg.failed_task_url.as_deref().unwrap_or(&msg.root_url)
        ),
        None => bail!("runtime stopped before the flow finished"),
    }
}

/// Dry-run output: the task tree and every scope's dependency edges.
fn print_dry_run(flow: &Flow) {
    let tree = flow.tree();
    println!("batchflow dry-run");
    println!(
        "  flow {} ({} tasks, {} leaves, {} dependencies)",
        flow.root_url(),
        tree.len(),
        flow.leaf_count(),
        flow.edge_count()
    );
    println!();

    println!("tasks:");
    let root = tree.root_id();
    for id in std::iter::once(root).chain(tree.descendants(root)) {
        let task = tree.task(id);
        let mut depth = 0;
        let mut cursor = task.parent;
        while let Some(parent) = cursor {
            depth += 1;
            cursor = tree.task(parent).parent;
        }
        let indent = "  ".repeat(depth + 1);
        match task.kind.command() {
            Some(cmd) => println!("{indent}- {} [{}] {cmd}", task.id, task.kind.name()),
            None => println!("{indent}- {} [{}]", task.id, task.kind.name()),
        }
        if !task.description.is_empty() {
            println!("{indent}    {}", task.description);
        }
    }

    println!();
    println!("dependencies:");
    for (scope_url, graph) in flow.scope_graphs() {
        for (from, to) in graph.edges() {
            println!(
                "  {scope_url}: {} -> {}",
                tree.task(from).id,
                tree.task(to).id
            );
        }
    }

    debug!("dry-run complete (no execution)");
}
