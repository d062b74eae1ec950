// src/dag/mod.rs

//! Static flow structure.
//!
//! - [`graph`] is the cycle-rejecting directed graph used for every scope.
//! - [`task`] defines task nodes and their kinds.
//! - [`tree`] is the arena that owns a flow's tasks.
//! - [`flow`] bundles the tree with its scope graphs.
//! - [`builder`] turns a definition document into a [`Flow`].

pub mod builder;
pub mod flow;
pub mod graph;
pub mod task;
pub mod tree;

pub use builder::{FlowBuilder, validate};
pub use flow::Flow;
pub use graph::DirectedGraph;
pub use task::{Task, TaskId, TaskKind};
pub use tree::TaskTree;
