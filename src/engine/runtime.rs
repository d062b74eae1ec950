// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bus::MessageBus;
use crate::dag::Flow;
use crate::errors::{EngineError, LaunchError, Result};
use crate::exec::{ExecutorBackend, WorkerPool};
use crate::types::InstanceId;

use super::core::CoreRuntime;
use super::instance::InstanceSnapshot;
use super::queue::{RunnableQueue, RunnableTask};
use super::{CoreCommand, RuntimeEvent, RuntimeOptions};

/// Drives the pure [`CoreRuntime`] from the runtime event channel.
///
/// This is the only place flow state is mutated. It answers requests,
/// publishes notifications on the bus and feeds the runnable queue, in the
/// order the core asked for.
pub struct Runtime {
    core: CoreRuntime,
    event_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
    bus: MessageBus,
    queue: RunnableQueue,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
        bus: MessageBus,
        queue: RunnableQueue,
    ) -> Self {
        Self {
            core,
            event_rx,
            bus,
            queue,
        }
    }

    /// Main event loop. Returns once shutdown is requested or every sender
    /// is gone; the runnable queue is closed on the way out.
    pub async fn run(mut self) -> Result<()> {
        info!("batchflow runtime started");

        while let Some(event) = self.event_rx.recv().await {
            debug!(?event, "runtime received event");
            if !self.handle_event(event) {
                info!("shutdown requested; stopping runtime");
                break;
            }
        }

        self.queue.close();
        info!("runtime exiting");
        Ok(())
    }

    /// Handle one event. Replies are sent after the resulting commands ran,
    /// so a caller observes their effects once its request returns.
    fn handle_event(&mut self, event: RuntimeEvent) -> bool {
        match event {
            RuntimeEvent::Launch { flow, reply } => {
                let result = self.core.launch(*flow).map(|(id, step)| {
                    self.execute(step.commands);
                    id
                });
                let _ = reply.send(result);
            }
            RuntimeEvent::Abort { instance_id, reply } => {
                let result = self
                    .core
                    .abort(instance_id)
                    .map(|step| self.execute(step.commands));
                let _ = reply.send(result);
            }
            RuntimeEvent::Retire { instance_id, reply } => {
                let _ = reply.send(self.core.retire(instance_id));
            }
            RuntimeEvent::Snapshot { instance_id, reply } => {
                let _ = reply.send(self.core.snapshot(instance_id));
            }
            RuntimeEvent::TaskStarted {
                instance_id,
                task_url,
            } => {
                let step = self.core.task_started(instance_id, &task_url);
                self.execute(step.commands);
            }
            RuntimeEvent::TaskFinished {
                instance_id,
                task_url,
                outcome,
            } => {
                let step = self.core.task_finished(instance_id, &task_url, outcome);
                self.execute(step.commands);
            }
            RuntimeEvent::OutcomeReported {
                instance_id: Some(instance_id),
                task_url,
                success,
                reply,
            } => {
                let step = self
                    .core
                    .instance_outcome_reported(instance_id, &task_url, success);
                self.execute(step.commands);
                let _ = reply.send(Ok(()));
            }
            RuntimeEvent::OutcomeReported {
                instance_id: None,
                task_url,
                success,
                reply,
            } => {
                let result = self
                    .core
                    .outcome_reported(&task_url, success)
                    .map(|step| self.execute(step.commands));
                let _ = reply.send(result);
            }
            RuntimeEvent::ShutdownRequested => {
                let step = self.core.shutdown();
                self.execute(step.commands);
                return step.keep_running;
            }
        }
        true
    }

    fn execute(&self, commands: Vec<CoreCommand>) {
        for command in commands {
            match command {
                CoreCommand::PublishStateChange(message) => self.bus.publish(message),
                CoreCommand::PublishFlowFinished(message) => self.bus.publish(message),
                CoreCommand::Enqueue(task) => {
                    debug!(instance = %task.instance_id, task = %task.task_url, "enqueueing task");
                    self.queue.push(task);
                }
                CoreCommand::CancelInstance { instance_id, token } => {
                    token.cancel();
                    let discarded = self.queue.discard_instance(instance_id);
                    info!(instance = %instance_id, discarded, "instance cancelled");
                }
            }
        }
    }
}

/// Explicitly owned scheduler: runtime loop, runnable queue, message bus and
/// (unless in pull mode) the worker pool.
///
/// Must be started from within a Tokio runtime.
pub struct SchedulerRuntime {
    events: mpsc::UnboundedSender<RuntimeEvent>,
    bus: MessageBus,
    queue: RunnableQueue,
    runtime_task: JoinHandle<Result<()>>,
    workers: Option<WorkerPool>,
}

impl fmt::Debug for SchedulerRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerRuntime")
            .field("queued", &self.queue.len())
            .field("workers", &self.workers.as_ref().map(WorkerPool::size))
            .finish_non_exhaustive()
    }
}

impl SchedulerRuntime {
    /// Start the runtime with a worker pool running tasks through `backend`.
    pub fn start<B>(options: RuntimeOptions, backend: B) -> Self
    where
        B: ExecutorBackend + 'static,
    {
        let mut runtime = Self::start_pull_mode(options);
        runtime.workers = Some(WorkerPool::spawn(
            options.workers,
            runtime.queue.clone(),
            runtime.events.clone(),
            Arc::new(backend),
        ));
        runtime
    }

    /// Start the runtime without workers; the caller drains runnable tasks
    /// with [`Self::next_runnable_task`] and reports with
    /// [`Self::report_outcome`].
    pub fn start_pull_mode(options: RuntimeOptions) -> Self {
        let (events, event_rx) = mpsc::unbounded_channel::<RuntimeEvent>();
        let bus = MessageBus::start();
        let queue = RunnableQueue::new();

        let runtime = Runtime::new(CoreRuntime::new(options), event_rx, bus.clone(), queue.clone());
        let runtime_task = tokio::spawn(runtime.run());

        Self {
            events,
            bus,
            queue,
            runtime_task,
            workers: None,
        }
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Launch a built flow. Fails if the flow already has a running instance.
    pub async fn launch(&self, flow: Flow) -> std::result::Result<InstanceId, LaunchError> {
        let (reply, rx) = oneshot::channel();
        self.events
            .send(RuntimeEvent::Launch {
                flow: Box::new(flow),
                reply,
            })
            .map_err(|_| LaunchError::RuntimeClosed)?;
        rx.await.map_err(|_| LaunchError::RuntimeClosed)?
    }

    pub async fn abort(&self, instance_id: InstanceId) -> std::result::Result<(), EngineError> {
        self.request(|reply| RuntimeEvent::Abort { instance_id, reply })
            .await
    }

    /// Drop a finished instance. `Ok(false)` while it is still running.
    pub async fn retire(&self, instance_id: InstanceId) -> std::result::Result<bool, EngineError> {
        self.request(|reply| RuntimeEvent::Retire { instance_id, reply })
            .await
    }

    pub async fn snapshot(
        &self,
        instance_id: InstanceId,
    ) -> std::result::Result<InstanceSnapshot, EngineError> {
        self.request(|reply| RuntimeEvent::Snapshot { instance_id, reply })
            .await
    }

    /// Take the next runnable task, if any, and report it as started.
    ///
    /// Tasks of cancelled instances are dropped on the way.
    pub fn next_runnable_task(&self) -> Option<RunnableTask> {
        while let Some(task) = self.queue.try_pop() {
            if task.is_cancelled() {
                debug!(task = %task.task_url, "dropping task of cancelled instance");
                continue;
            }
            let started = RuntimeEvent::TaskStarted {
                instance_id: task.instance_id,
                task_url: task.task_url.clone(),
            };
            if self.events.send(started).is_err() {
                warn!(task = %task.task_url, "runtime closed; not handing out task");
                return None;
            }
            return Some(task);
        }
        None
    }

    /// Report the outcome of a task handed out by
    /// [`Self::next_runnable_task`], by url.
    ///
    /// Applies to the instance where the task is running; ignored when it
    /// runs nowhere. `UnknownTask` for urls of flows never launched.
    pub async fn report_outcome(
        &self,
        task_url: &str,
        success: bool,
    ) -> std::result::Result<(), EngineError> {
        let task_url = task_url.to_string();
        self.request(|reply| RuntimeEvent::OutcomeReported {
            instance_id: None,
            task_url,
            success,
            reply,
        })
        .await
    }

    /// Report the outcome of `task` against the instance it was handed out
    /// for. Reports for finished or retired instances are ignored.
    pub async fn report_task_outcome(
        &self,
        task: &RunnableTask,
        success: bool,
    ) -> std::result::Result<(), EngineError> {
        let instance_id = Some(task.instance_id);
        let task_url = task.task_url.clone();
        self.request(|reply| RuntimeEvent::OutcomeReported {
            instance_id,
            task_url,
            success,
            reply,
        })
        .await
    }

    /// Abort running instances, stop the loop and workers, and drain the
    /// bus.
    pub async fn shutdown(self) -> Result<()> {
        info!("shutting down scheduler runtime");
        let _ = self.events.send(RuntimeEvent::ShutdownRequested);

        let loop_result = self
            .runtime_task
            .await
            .map_err(|e| anyhow!("runtime task failed: {e}"))?;
        // The loop closes the queue on exit; close again in case it ended
        // without getting there.
        self.queue.close();

        if let Some(workers) = self.workers {
            workers.join().await;
        }

        self.bus.flush().await;
        self.bus.shutdown().await;
        loop_result
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<std::result::Result<T, EngineError>>) -> RuntimeEvent,
    ) -> std::result::Result<T, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.events
            .send(make(reply))
            .map_err(|_| EngineError::RuntimeClosed)?;
        rx.await.map_err(|_| EngineError::RuntimeClosed)?
    }
}
