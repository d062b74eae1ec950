use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a task inside a running flow instance.
///
/// - `Inactive`: initial state, never scheduled.
/// - `Standby`: armed by a launch; waiting for predecessors / dispatch.
/// - `Running`: a leaf's command is running, or a container has at least
///   one running descendant.
/// - `Complete` / `Failed`: terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskState {
    Inactive,
    Standby,
    Running,
    Complete,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Complete | TaskState::Failed)
    }
}

impl Default for TaskState {
    fn default() -> Self {
        TaskState::Inactive
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Inactive => "INACTIVE",
            TaskState::Standby => "STANDBY",
            TaskState::Running => "RUNNING",
            TaskState::Complete => "COMPLETE",
            TaskState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "INACTIVE" => Ok(TaskState::Inactive),
            "STANDBY" => Ok(TaskState::Standby),
            "RUNNING" => Ok(TaskState::Running),
            "COMPLETE" => Ok(TaskState::Complete),
            "FAILED" => Ok(TaskState::Failed),
            other => Err(format!("invalid task state: {other}")),
        }
    }
}

/// Identifier of one running copy of a flow, distinct from the flow's
/// definition id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(Uuid);

impl InstanceId {
    pub fn new() -> Self {
        InstanceId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for InstanceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(InstanceId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_complete_and_failed_are_terminal() {
        assert!(TaskState::Complete.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(!TaskState::Inactive.is_terminal());
        assert!(!TaskState::Standby.is_terminal());
        assert!(!TaskState::Running.is_terminal());
    }

    #[test]
    fn task_state_parses_case_insensitively() {
        assert_eq!("standby".parse::<TaskState>(), Ok(TaskState::Standby));
        assert_eq!(" FAILED ".parse::<TaskState>(), Ok(TaskState::Failed));
        assert!("SKIP".parse::<TaskState>().is_err());
    }

    #[test]
    fn instance_ids_are_unique_and_round_trip_through_display() {
        let a = InstanceId::new();
        let b = InstanceId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string().parse::<InstanceId>().unwrap(), a);
    }
}
