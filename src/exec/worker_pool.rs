// src/exec/worker_pool.rs

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::{RunnableQueue, RuntimeEvent};

use super::backend::ExecutorBackend;

/// Default pool size: the machine's available parallelism.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Fixed set of worker tasks draining the runnable queue.
///
/// Each worker pops a task, skips it if its instance was cancelled, reports
/// the start, runs it through the backend and reports the outcome. Workers
/// never touch flow state directly.
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn<B>(
        size: usize,
        queue: RunnableQueue,
        events: mpsc::UnboundedSender<RuntimeEvent>,
        backend: Arc<B>,
    ) -> Self
    where
        B: ExecutorBackend + 'static,
    {
        let size = size.max(1);
        info!(workers = size, "starting worker pool");

        let handles = (0..size)
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    queue.clone(),
                    events.clone(),
                    Arc::clone(&backend),
                ))
            })
            .collect();

        Self { handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to exit. Workers exit once the queue is closed
    /// and drained, or the runtime is gone.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "worker ended abnormally");
            }
        }
    }
}

async fn worker_loop<B: ExecutorBackend>(
    worker: usize,
    queue: RunnableQueue,
    events: mpsc::UnboundedSender<RuntimeEvent>,
    backend: Arc<B>,
) {
    debug!(worker, "worker started");

    while let Some(task) = queue.pop().await {
        if task.is_cancelled() {
            debug!(worker, task = %task.task_url, "skipping task of cancelled instance");
            continue;
        }

        let started = RuntimeEvent::TaskStarted {
            instance_id: task.instance_id,
            task_url: task.task_url.clone(),
        };
        if events.send(started).is_err() {
            break;
        }

        let outcome = backend.execute(&task).await;
        debug!(worker, task = %task.task_url, ?outcome, "task finished");

        let finished = RuntimeEvent::TaskFinished {
            instance_id: task.instance_id,
            task_url: task.task_url,
            outcome,
        };
        if events.send(finished).is_err() {
            break;
        }
    }

    debug!(worker, "worker finished");
}
