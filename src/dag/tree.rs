// src/dag/tree.rs

use std::collections::HashMap;

use crate::dag::task::{Task, TaskId};

/// Arena holding every task of one flow, addressable by id or url.
#[derive(Debug, Clone)]
pub struct TaskTree {
    tasks: Vec<Task>,
    by_url: HashMap<String, TaskId>,
    root: TaskId,
}

impl TaskTree {
    /// Start a tree with its root task.
    pub fn with_root(root: Task) -> Self {
        let mut tree = Self {
            tasks: Vec::new(),
            by_url: HashMap::new(),
            root: TaskId(0),
        };
        tree.root = tree.push(root);
        tree
    }

    /// Append `task` as the last child of `parent`.
    pub fn add_child(&mut self, parent: TaskId, mut task: Task) -> TaskId {
        task.parent = Some(parent);
        let id = self.push(task);
        self.tasks[parent.0].children.push(id);
        id
    }

    fn push(&mut self, task: Task) -> TaskId {
        let id = TaskId(self.tasks.len());
        self.by_url.insert(task.url.clone(), id);
        self.tasks.push(task);
        id
    }

    pub fn root_id(&self) -> TaskId {
        self.root
    }

    pub fn root(&self) -> &Task {
        &self.tasks[self.root.0]
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id.0)
    }

    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(id.0)
    }

    /// Panicking accessor for ids handed out by this tree.
    pub fn task(&self, id: TaskId) -> &Task {
        &self.tasks[id.0]
    }

    pub fn task_mut(&mut self, id: TaskId) -> &mut Task {
        &mut self.tasks[id.0]
    }

    pub fn id_of(&self, url: &str) -> Option<TaskId> {
        self.by_url.get(url).copied()
    }

    pub fn by_url(&self, url: &str) -> Option<&Task> {
        self.id_of(url).map(|id| &self.tasks[id.0])
    }

    pub fn parent_of(&self, id: TaskId) -> Option<TaskId> {
        self.get(id).and_then(|t| t.parent)
    }

    pub fn children_of(&self, id: TaskId) -> &[TaskId] {
        self.get(id).map(|t| t.children.as_slice()).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// All task ids in insertion (breadth-first build) order.
    pub fn ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        (0..self.tasks.len()).map(TaskId)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn leaf_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_leaf()).count()
    }

    /// Ids of every task below `id` (excluding `id` itself), depth-first.
    pub fn descendants(&self, id: TaskId) -> Vec<TaskId> {
        let mut out = Vec::new();
        let mut stack: Vec<TaskId> = self.children_of(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children_of(next).iter().rev().copied());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::task::TaskKind;

    fn leaf(id: &str, url: &str) -> Task {
        Task::new(id, url, TaskKind::Leaf { command: format!("echo {id}") })
    }

    #[test]
    fn children_get_parent_back_references() {
        let mut tree = TaskTree::with_root(Task::new("flow", "/flow", TaskKind::Flow));
        let root = tree.root_id();
        let g = tree.add_child(root, Task::new("g", "/flow/g", TaskKind::Group));
        let a = tree.add_child(g, leaf("a", "/flow/g/a"));

        assert_eq!(tree.parent_of(a), Some(g));
        assert_eq!(tree.parent_of(g), Some(root));
        assert_eq!(tree.parent_of(root), None);
        assert_eq!(tree.children_of(g), &[a]);
        assert_eq!(tree.id_of("/flow/g/a"), Some(a));
        assert_eq!(tree.leaf_count(), 1);
    }

    #[test]
    fn descendants_are_depth_first_in_child_order() {
        let mut tree = TaskTree::with_root(Task::new("f", "/f", TaskKind::Flow));
        let root = tree.root_id();
        let g = tree.add_child(root, Task::new("g", "/f/g", TaskKind::Group));
        let x = tree.add_child(root, leaf("x", "/f/x"));
        let a = tree.add_child(g, leaf("a", "/f/g/a"));
        let b = tree.add_child(g, leaf("b", "/f/g/b"));

        assert_eq!(tree.descendants(root), vec![g, a, b, x]);
        assert!(tree.descendants(x).is_empty());
    }
}
