// src/definition/model.rs

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// A flow definition document: task id -> task attributes.
///
/// ```json
/// {
///   "nightly": { "desc": "nightly batch" },
///   "extract": { "group": "nightly", "cmd": "./extract.sh" },
///   "load":    { "group": "nightly", "cmd": "./load.sh", "depends": ["extract"] }
/// }
/// ```
///
/// The entry without a `group` (or whose `group` is its own id) is the flow
/// root. Every other entry belongs to the group it names; an entry that
/// other entries name as their group becomes a container.
///
/// Entries are kept sorted by id, which is also the order siblings are
/// built and dispatched in. A document that repeats an id is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FlowDefinition {
    pub tasks: BTreeMap<String, TaskDefinition>,
}

/// Attributes of one entry in a [`FlowDefinition`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Free-form description.
    #[serde(default, alias = "description")]
    pub desc: Option<String>,

    /// Command line; required for leaves, forbidden for containers.
    #[serde(default, rename = "cmd", alias = "command")]
    pub command: Option<String>,

    /// Id of the containing group. Absent (or equal to the entry's own id)
    /// for the flow root.
    #[serde(default)]
    pub group: Option<String>,

    /// Ids of sibling tasks that must complete before this one starts.
    #[serde(default)]
    pub depends: Vec<String>,
}

impl FlowDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, task: TaskDefinition) {
        self.tasks.insert(id.into(), task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl<'de> Deserialize<'de> for FlowDefinition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TasksVisitor;

        impl<'de> Visitor<'de> for TasksVisitor {
            type Value = FlowDefinition;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of task id to task definition")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut tasks = BTreeMap::new();
                while let Some((id, task)) = map.next_entry::<String, TaskDefinition>()? {
                    if tasks.contains_key(&id) {
                        return Err(de::Error::custom(format!("duplicate task id `{id}`")));
                    }
                    tasks.insert(id, task);
                }
                Ok(FlowDefinition { tasks })
            }
        }

        deserializer.deserialize_map(TasksVisitor)
    }
}

impl TaskDefinition {
    /// Effective group id: the declared one, or the entry's own id.
    pub fn effective_group<'a>(&'a self, own_id: &'a str) -> &'a str {
        match self.group.as_deref() {
            Some(g) if !g.trim().is_empty() => g,
            _ => own_id,
        }
    }

    /// Non-blank command, if any.
    pub fn effective_command(&self) -> Option<&str> {
        self.command
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}
