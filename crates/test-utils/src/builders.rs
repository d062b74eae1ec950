#![allow(dead_code)]

use batchflow::Flow;
use batchflow::definition::{FlowDefinition, TaskDefinition};

/// Builder for `FlowDefinition` documents to simplify test setup.
///
/// ```ignore
/// let flow = FlowDefinitionBuilder::new("f")
///     .leaf("a", "f", "true")
///     .with("b", TaskDefinitionBuilder::leaf("f", "true").depends("a"))
///     .build_flow();
/// ```
pub struct FlowDefinitionBuilder {
    definition: FlowDefinition,
}

impl FlowDefinitionBuilder {
    /// Start a document with its root entry.
    pub fn new(root: &str) -> Self {
        let mut definition = FlowDefinition::new();
        definition.insert(root, TaskDefinition::default());
        Self { definition }
    }

    /// Start an empty document (no root).
    pub fn empty() -> Self {
        Self {
            definition: FlowDefinition::new(),
        }
    }

    pub fn with(mut self, id: &str, task: TaskDefinitionBuilder) -> Self {
        self.definition.insert(id, task.build());
        self
    }

    pub fn group(self, id: &str, parent: &str) -> Self {
        self.with(id, TaskDefinitionBuilder::group(parent))
    }

    pub fn leaf(self, id: &str, group: &str, cmd: &str) -> Self {
        self.with(id, TaskDefinitionBuilder::leaf(group, cmd))
    }

    pub fn build(self) -> FlowDefinition {
        self.definition
    }

    pub fn build_flow(self) -> Flow {
        batchflow::validate(&self.definition).expect("Failed to build valid flow from builder")
    }
}

/// Builder for `TaskDefinition`.
pub struct TaskDefinitionBuilder {
    task: TaskDefinition,
}

impl TaskDefinitionBuilder {
    pub fn root() -> Self {
        Self {
            task: TaskDefinition::default(),
        }
    }

    pub fn group(parent: &str) -> Self {
        Self {
            task: TaskDefinition {
                group: Some(parent.to_string()),
                ..TaskDefinition::default()
            },
        }
    }

    pub fn leaf(group: &str, cmd: &str) -> Self {
        Self {
            task: TaskDefinition {
                group: Some(group.to_string()),
                command: Some(cmd.to_string()),
                ..TaskDefinition::default()
            },
        }
    }

    pub fn depends(mut self, id: &str) -> Self {
        self.task.depends.push(id.to_string());
        self
    }

    pub fn desc(mut self, desc: &str) -> Self {
        self.task.desc = Some(desc.to_string());
        self
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.task.command = Some(cmd.to_string());
        self
    }

    pub fn build(self) -> TaskDefinition {
        self.task
    }
}

/// Five leaves under root `f` with edges A->D, B->C, B->D, A->E, C->E.
pub fn five_task_flow(cmd: &str) -> FlowDefinitionBuilder {
    FlowDefinitionBuilder::new("f")
        .leaf("A", "f", cmd)
        .leaf("B", "f", cmd)
        .with("C", TaskDefinitionBuilder::leaf("f", cmd).depends("B"))
        .with(
            "D",
            TaskDefinitionBuilder::leaf("f", cmd).depends("A").depends("B"),
        )
        .with(
            "E",
            TaskDefinitionBuilder::leaf("f", cmd).depends("A").depends("C"),
        )
}
