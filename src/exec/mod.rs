// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the commands of leaf
//! tasks, using `tokio::process::Command`, and reporting back to the
//! runtime via `RuntimeEvent`s.
//!
//! - [`worker_pool`] owns the workers draining the runnable queue.
//! - [`task_runner`] handles individual task process execution.
//! - [`backend`] provides the `ExecutorBackend` trait and the concrete
//!   `ProcessBackend` used in production, which tests can replace with a
//!   fake implementation.

pub mod backend;
pub mod task_runner;
pub mod worker_pool;

pub use backend::{ExecutorBackend, ProcessBackend};
pub use task_runner::ProcessSettings;
pub use worker_pool::{WorkerPool, default_worker_count};
