// src/dag/flow.rs

use std::collections::BTreeMap;

use crate::dag::graph::DirectedGraph;
use crate::dag::task::{Task, TaskId};
use crate::dag::tree::TaskTree;

/// A built flow: the task tree plus one dependency graph per scope.
///
/// A scope is the set of direct children of one container (the flow root or
/// a group); its graph is keyed by the container's id. Edges only ever
/// connect siblings.
#[derive(Debug, Clone)]
pub struct Flow {
    tree: TaskTree,
    graphs: BTreeMap<TaskId, DirectedGraph<TaskId>>,
}

impl Flow {
    pub(crate) fn new(tree: TaskTree, graphs: BTreeMap<TaskId, DirectedGraph<TaskId>>) -> Self {
        Self { tree, graphs }
    }

    pub fn tree(&self) -> &TaskTree {
        &self.tree
    }

    pub(crate) fn tree_mut(&mut self) -> &mut TaskTree {
        &mut self.tree
    }

    pub fn root(&self) -> &Task {
        self.tree.root()
    }

    pub fn root_url(&self) -> &str {
        &self.tree.root().url
    }

    pub fn task_by_url(&self, url: &str) -> Option<&Task> {
        self.tree.by_url(url)
    }

    /// Graph of the scope owned by container `scope`.
    pub fn scope_graph(&self, scope: TaskId) -> Option<&DirectedGraph<TaskId>> {
        self.graphs.get(&scope)
    }

    /// Graph of the scope owned by the container at `scope_url`.
    pub fn graph_for_url(&self, scope_url: &str) -> Option<&DirectedGraph<TaskId>> {
        self.tree.id_of(scope_url).and_then(|id| self.graphs.get(&id))
    }

    /// `(scope url, graph)` pairs, ordered by scope id.
    pub fn scope_graphs(&self) -> impl Iterator<Item = (&str, &DirectedGraph<TaskId>)> {
        self.graphs
            .iter()
            .map(|(scope, graph)| (self.tree.task(*scope).url.as_str(), graph))
    }

    /// Predecessors of `task` within its own scope.
    pub fn predecessors(&self, task: TaskId) -> Vec<TaskId> {
        self.owning_graph(task)
            .map(|g| g.predecessors(task))
            .unwrap_or_default()
    }

    /// Successors of `task` within its own scope.
    pub fn successors(&self, task: TaskId) -> Vec<TaskId> {
        self.owning_graph(task)
            .map(|g| g.successors(task))
            .unwrap_or_default()
    }

    fn owning_graph(&self, task: TaskId) -> Option<&DirectedGraph<TaskId>> {
        let parent = self.tree.parent_of(task)?;
        self.graphs.get(&parent)
    }

    pub fn leaf_count(&self) -> usize {
        self.tree.leaf_count()
    }

    /// Total number of dependency edges over all scopes.
    pub fn edge_count(&self) -> usize {
        self.graphs.values().map(|g| g.edge_count()).sum()
    }
}
