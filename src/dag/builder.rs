// src/dag/builder.rs

//! Turn a [`FlowDefinition`] into a [`Flow`].
//!
//! Two passes:
//! 1. structure: find the single root, attach every entry to its group
//!    breadth-first, and decide each task's kind;
//! 2. graphs: one [`DirectedGraph`] per container, with an edge
//!    `predecessor -> task` for every resolved sibling dependency.
//!
//! Building is pure; it is also what "validate" means for a definition.

use std::collections::{BTreeMap, HashMap, VecDeque};

use tracing::debug;

use crate::dag::flow::Flow;
use crate::dag::graph::DirectedGraph;
use crate::dag::task::{Task, TaskId, TaskKind};
use crate::dag::tree::TaskTree;
use crate::definition::{FlowDefinition, TaskDefinition};
use crate::errors::{DefinitionError, GraphError};

/// Longest accepted task description, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 512;

/// Builds flows from definitions.
#[derive(Debug, Clone)]
pub struct FlowBuilder {
    max_description_len: usize,
}

impl Default for FlowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowBuilder {
    pub fn new() -> Self {
        Self {
            max_description_len: MAX_DESCRIPTION_LEN,
        }
    }

    pub fn with_max_description_len(mut self, max: usize) -> Self {
        self.max_description_len = max;
        self
    }

    pub fn build(&self, def: &FlowDefinition) -> Result<Flow, DefinitionError> {
        if def.is_empty() {
            return Err(DefinitionError::Empty);
        }
        validate_ids(def)?;

        let root_id = find_root(def)?;
        let members = group_members(def, root_id)?;
        let tree = self.build_tree(def, root_id, &members)?;

        if tree.len() != def.len() {
            let orphan = def
                .tasks
                .keys()
                .find(|id| !in_tree(&tree, id))
                .cloned()
                .unwrap_or_default();
            return Err(DefinitionError::Unreachable(orphan));
        }

        let graphs = build_graphs(&tree)?;
        let flow = Flow::new(tree, graphs);

        debug!(
            root = %flow.root_url(),
            tasks = flow.tree().len(),
            leaves = flow.leaf_count(),
            edges = flow.edge_count(),
            "built flow from definition"
        );
        Ok(flow)
    }

    /// Structure pass.
    fn build_tree(
        &self,
        def: &FlowDefinition,
        root_id: &str,
        members: &BTreeMap<&str, Vec<&str>>,
    ) -> Result<TaskTree, DefinitionError> {
        let root_def = &def.tasks[root_id];
        if !root_def.depends.is_empty() {
            return Err(DefinitionError::RootDependencies(root_id.to_string()));
        }
        let root = self.make_task(root_id, format!("/{root_id}"), root_def, TaskKind::Flow)?;
        let mut tree = TaskTree::with_root(root);

        let mut queue: VecDeque<(TaskId, &str)> = VecDeque::new();
        queue.push_back((tree.root_id(), root_id));

        while let Some((parent, parent_id)) = queue.pop_front() {
            let Some(children) = members.get(parent_id) else {
                continue;
            };
            for &child_id in children {
                let child_def = &def.tasks[child_id];
                let kind = if members.contains_key(child_id) {
                    TaskKind::Group
                } else {
                    match child_def.effective_command() {
                        Some(cmd) => TaskKind::Leaf {
                            command: cmd.to_string(),
                        },
                        None => {
                            return Err(DefinitionError::MissingCommand {
                                task: child_id.to_string(),
                            });
                        }
                    }
                };
                let url = format!("{}/{}", tree.task(parent).url, child_id);
                let task = self.make_task(child_id, url, child_def, kind)?;
                let id = tree.add_child(parent, task);
                queue.push_back((id, child_id));
            }
        }

        Ok(tree)
    }

    fn make_task(
        &self,
        id: &str,
        url: String,
        def: &TaskDefinition,
        kind: TaskKind,
    ) -> Result<Task, DefinitionError> {
        let description = def.desc.clone().unwrap_or_default();
        if description.chars().count() > self.max_description_len {
            return Err(DefinitionError::DescriptionTooLong {
                task: id.to_string(),
                max: self.max_description_len,
            });
        }
        if !kind.is_leaf() && def.effective_command().is_some() {
            return Err(DefinitionError::UnexpectedCommand {
                task: id.to_string(),
                kind: kind.name(),
            });
        }

        let mut task = Task::new(id, url, kind);
        task.description = description;
        task.predecessor_ids = dedup(&def.depends);
        Ok(task)
    }
}

/// Build a flow with default settings.
pub fn validate(def: &FlowDefinition) -> Result<Flow, DefinitionError> {
    FlowBuilder::new().build(def)
}

fn validate_ids(def: &FlowDefinition) -> Result<(), DefinitionError> {
    for id in def.tasks.keys() {
        if id.trim().is_empty() || id.contains('/') {
            return Err(DefinitionError::InvalidId(id.clone()));
        }
    }
    Ok(())
}

fn find_root(def: &FlowDefinition) -> Result<&str, DefinitionError> {
    let mut root: Option<&str> = None;
    for (id, task) in def.tasks.iter() {
        if task.effective_group(id) != id {
            continue;
        }
        if let Some(first) = root {
            return Err(DefinitionError::MultipleRoots {
                first: first.to_string(),
                second: id.clone(),
            });
        }
        root = Some(id.as_str());
    }
    root.ok_or(DefinitionError::NoRoot)
}

/// Group id -> member ids, sorted by id. The root is nobody's member.
fn group_members<'a>(
    def: &'a FlowDefinition,
    root_id: &str,
) -> Result<BTreeMap<&'a str, Vec<&'a str>>, DefinitionError> {
    let mut members: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (id, task) in def.tasks.iter() {
        if id == root_id {
            continue;
        }
        let group = task.effective_group(id);
        if !def.tasks.contains_key(group) {
            return Err(DefinitionError::UnknownGroup {
                task: id.clone(),
                group: group.to_string(),
            });
        }
        members.entry(group).or_default().push(id.as_str());
    }
    Ok(members)
}

fn in_tree(tree: &TaskTree, id: &str) -> bool {
    tree.iter().any(|t| t.id == id)
}

/// Graph pass: one graph per container, edges between resolved siblings.
fn build_graphs(
    tree: &TaskTree,
) -> Result<BTreeMap<TaskId, DirectedGraph<TaskId>>, DefinitionError> {
    let mut graphs = BTreeMap::new();

    for scope in tree.ids() {
        let scope_task = tree.task(scope);
        if scope_task.is_leaf() {
            continue;
        }

        let mut graph = DirectedGraph::new();
        let mut siblings: HashMap<&str, TaskId> = HashMap::new();
        for &child in &scope_task.children {
            graph.add_vertex(child);
            siblings.insert(tree.task(child).id.as_str(), child);
        }

        for &child in &scope_task.children {
            let task = tree.task(child);
            for pred_id in &task.predecessor_ids {
                if pred_id == &task.id {
                    return Err(DefinitionError::SelfDependency(task.id.clone()));
                }
                let Some(&pred) = siblings.get(pred_id.as_str()) else {
                    return Err(DefinitionError::UnresolvedPredecessor {
                        task: task.id.clone(),
                        predecessor: pred_id.clone(),
                        scope: scope_task.url.clone(),
                    });
                };
                graph.put_edge(pred, child).map_err(|err| match err {
                    GraphError::Cycle { .. } => DefinitionError::Cycle {
                        from: pred_id.clone(),
                        to: task.id.clone(),
                    },
                    GraphError::SelfLoop { .. } => DefinitionError::SelfDependency(task.id.clone()),
                })?;
            }
        }

        graphs.insert(scope, graph);
    }

    Ok(graphs)
}

fn dedup(ids: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(id.clone());
        }
    }
    out
}
