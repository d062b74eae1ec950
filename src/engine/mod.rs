// src/engine/mod.rs

//! Orchestration engine for batchflow.
//!
//! This module ties together:
//! - the registry of running flow instances
//! - the task state machine and upward propagation of terminal states
//! - the scheduler that decides which tasks became runnable
//! - the runnable queue shared with the worker pool
//! - the runtime event loop that reacts to:
//!   - launch / abort / retire requests
//!   - task start and finish reports from workers or pull-mode callers
//!   - shutdown requests
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use tokio::sync::oneshot;

use crate::dag::Flow;
use crate::errors::{EngineError, LaunchError};
use crate::types::InstanceId;

/// Outcome of running one leaf command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    /// Non-zero exit code, or `-1` for spawn / I/O errors.
    Failed(i32),
    /// The process was killed because its instance was cancelled.
    Cancelled,
}

impl TaskOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, TaskOutcome::Success)
    }

    pub fn from_success(success: bool) -> Self {
        if success {
            TaskOutcome::Success
        } else {
            TaskOutcome::Failed(1)
        }
    }
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Drop instances from the registry as soon as their root is terminal.
    pub retire_finished: bool,
    /// Size of the worker pool started by [`SchedulerRuntime::start`].
    pub workers: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            retire_finished: false,
            workers: crate::exec::default_worker_count(),
        }
    }
}

/// Events flowing into the runtime loop from the API handle and workers.
#[derive(Debug)]
pub enum RuntimeEvent {
    Launch {
        flow: Box<Flow>,
        reply: oneshot::Sender<Result<InstanceId, LaunchError>>,
    },
    Abort {
        instance_id: InstanceId,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Retire {
        instance_id: InstanceId,
        reply: oneshot::Sender<Result<bool, EngineError>>,
    },
    Snapshot {
        instance_id: InstanceId,
        reply: oneshot::Sender<Result<InstanceSnapshot, EngineError>>,
    },
    /// A worker picked the task up and is about to run it.
    TaskStarted {
        instance_id: InstanceId,
        task_url: String,
    },
    /// A worker finished running the task.
    TaskFinished {
        instance_id: InstanceId,
        task_url: String,
        outcome: TaskOutcome,
    },
    /// Pull-mode outcome report, addressed by url or by instance and url.
    OutcomeReported {
        instance_id: Option<InstanceId>,
        task_url: String,
        success: bool,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C or `shutdown()`).
    ShutdownRequested,
}

pub mod cancel;
pub mod core;
pub mod event_handlers;
pub mod instance;
pub mod queue;
pub mod runtime;
pub mod scheduler;
pub mod state_machine;

pub use cancel::CancelToken;
pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use instance::{FlowInstance, InstanceSnapshot};
pub use queue::{RunnableQueue, RunnableTask};
pub use runtime::{Runtime, SchedulerRuntime};
