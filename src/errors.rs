// src/errors.rs

//! Crate-wide error types and aliases.

use thiserror::Error;

use crate::types::InstanceId;

/// A flow definition could not be turned into a task tree + scope graphs.
///
/// Always reported synchronously to the caller of `validate` / `launch`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("flow definition contains no tasks")]
    Empty,

    #[error("flow definition has no root task (an entry without `group`, or whose `group` is its own id)")]
    NoRoot,

    #[error("only one flow can be defined per document; found roots '{first}' and '{second}'")]
    MultipleRoots { first: String, second: String },

    #[error("invalid task id '{0}': ids must be non-blank and must not contain '/'")]
    InvalidId(String),

    #[error("task '{task}' references unknown group '{group}'")]
    UnknownGroup { task: String, group: String },

    #[error("task '{0}' is not reachable from the flow root (cyclic `group` references?)")]
    Unreachable(String),

    #[error("task '{task}' has no children and no command")]
    MissingCommand { task: String },

    #[error("{kind} task '{task}' must not declare a command")]
    UnexpectedCommand { task: String, kind: &'static str },

    #[error("flow root '{0}' must not declare dependencies")]
    RootDependencies(String),

    #[error("description of task '{task}' is longer than {max} characters")]
    DescriptionTooLong { task: String, max: usize },

    #[error("task '{task}' depends on '{predecessor}', which is not a sibling in '{scope}'")]
    UnresolvedPredecessor {
        task: String,
        predecessor: String,
        scope: String,
    },

    #[error("task '{0}' cannot depend on itself")]
    SelfDependency(String),

    #[error("dependency '{from}' -> '{to}' would create a cycle")]
    Cycle { from: String, to: String },
}

/// Rejected mutation of a [`crate::dag::DirectedGraph`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("self-loop on {vertex} is not allowed")]
    SelfLoop { vertex: String },

    #[error("edge {from} -> {to} would create a cycle")]
    Cycle { from: String, to: String },
}

/// A flow could not be launched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    #[error("flow '{root_url}' is already running as instance {running}")]
    Conflict {
        root_url: String,
        running: InstanceId,
    },

    #[error("scheduler runtime is not running")]
    RuntimeClosed,
}

/// Errors from operations addressed at an existing instance or task.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("flow instance not found: {0}")]
    NotFound(InstanceId),

    #[error("no running flow instance owns task '{0}'")]
    UnknownTask(String),

    #[error("scheduler runtime is not running")]
    RuntimeClosed,
}

#[derive(Error, Debug)]
pub enum BatchflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Definition error: {0}")]
    Definition(#[from] DefinitionError),

    #[error("Launch error: {0}")]
    Launch(#[from] LaunchError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BatchflowError>;
