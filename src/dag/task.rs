// src/dag/task.rs

//! Task nodes stored in the task tree and used as graph vertices.

use std::fmt;

use crate::types::TaskState;

/// Index of a task inside its [`crate::dag::TaskTree`] arena.
///
/// Cheap to copy, totally ordered and hashable, so it doubles as the vertex
/// type of every scope graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a task is, and the data only that kind carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    /// The single root of a flow; aggregates its children.
    Flow,
    /// A container inside the flow; aggregates its children.
    Group,
    /// Wraps one external command.
    Leaf { command: String },
}

impl TaskKind {
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::Flow => "FLOW",
            TaskKind::Group => "GROUP",
            TaskKind::Leaf { .. } => "LEAF",
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, TaskKind::Leaf { .. })
    }

    /// Command line for leaves, `None` for containers.
    pub fn command(&self) -> Option<&str> {
        match self {
            TaskKind::Leaf { command } => Some(command.as_str()),
            TaskKind::Flow | TaskKind::Group => None,
        }
    }
}

/// One node of a flow's task tree.
///
/// Ownership flows from the tree arena; `parent` and `children` are plain
/// indices into it.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub url: String,
    pub kind: TaskKind,
    pub description: String,
    pub parent: Option<TaskId>,
    pub children: Vec<TaskId>,
    /// Raw `depends` entries from the definition, resolved to sibling
    /// edges in the parent's scope graph at build time.
    pub predecessor_ids: Vec<String>,

    pub state: TaskState,
    /// Children not yet terminal (containers only).
    pub unfinished_children: usize,
    /// Leaf: pushed on the runnable queue. Container: children evaluated.
    pub scheduled: bool,
    /// Url of the leaf whose failure made this task fail.
    pub failure_origin: Option<String>,
}

impl Task {
    pub fn new(id: impl Into<String>, url: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            kind,
            description: String::new(),
            parent: None,
            children: Vec::new(),
            predecessor_ids: Vec::new(),
            state: TaskState::Inactive,
            unfinished_children: 0,
            scheduled: false,
            failure_origin: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.kind.is_leaf()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}
