//! Status definitions for workflows, tasks, events, and executions.
//!
//! Each status enum carries the small set of predicates the engine and
//! dispatcher branch on; transition legality itself lives with the
//! component that owns the record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Workflow lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Initial state when the workflow is created
    Draft,
    /// Workflow has a running execution
    Active,
    /// Workflow was stopped and can be restarted
    Paused,
    /// Last execution completed successfully
    Completed,
    /// Last execution aborted on a task failure
    Failed,
    /// Workflow is retired from scheduling
    Archived,
}

impl WorkflowStatus {
    /// States from which `start_workflow` is allowed
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Draft | Self::Paused)
    }

    /// Check if this is a terminal state for the current run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Archived)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Active => write!(f, "active"),
            Self::Paused => write!(f, "paused"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

impl std::str::FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "archived" => Ok(Self::Archived),
            _ => Err(format!("Invalid workflow status: {s}")),
        }
    }
}

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Initial state when the task is created
    Todo,
    /// Task is currently being executed
    InProgress,
    /// Task output awaits review
    Review,
    /// Task failed; terminal for the engine (no automatic retry)
    Blocked,
    /// Task completed successfully
    Done,
    /// Task was cancelled
    Cancelled,
}

impl TaskStatus {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Blocked | Self::Cancelled)
    }

    /// Check if the task is eligible for execution
    pub fn is_executable(&self) -> bool {
        matches!(self, Self::Todo)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Todo => write!(f, "todo"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Review => write!(f, "review"),
            Self::Blocked => write!(f, "blocked"),
            Self::Done => write!(f, "done"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(Self::Todo),
            "in_progress" => Ok(Self::InProgress),
            "review" => Ok(Self::Review),
            "blocked" => Ok(Self::Blocked),
            "done" => Ok(Self::Done),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}

/// Event delivery status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Persisted and waiting in the delivery queue
    Pending,
    /// A handling unit owns the event
    Processing,
    /// Delivered; terminal, kept for audit
    Processed,
    /// Processing failed before fan-out; may be retried
    Failed,
    /// Reserved; no producer in this core
    Cancelled,
}

impl EventStatus {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Processed | Self::Cancelled)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Processed => write!(f, "processed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "processed" => Ok(Self::Processed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid event status: {s}")),
        }
    }
}

/// Execution (single workflow run) status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Run is in progress
    Running,
    /// All stages completed
    Completed,
    /// Aborted on a task failure
    Failed,
    /// Stopped cooperatively via `stop_workflow`
    Stopped,
}

impl ExecutionStatus {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "stopped" => Ok(Self::Stopped),
            _ => Err(format!("Invalid execution status: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_start_eligibility() {
        assert!(WorkflowStatus::Draft.can_start());
        assert!(WorkflowStatus::Paused.can_start());
        assert!(!WorkflowStatus::Active.can_start());
        assert!(!WorkflowStatus::Completed.can_start());
        assert!(!WorkflowStatus::Archived.can_start());
    }

    #[test]
    fn test_task_terminal_states() {
        assert!(TaskStatus::Done.is_terminal());
        assert!(TaskStatus::Blocked.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Todo.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
        assert!(!TaskStatus::Review.is_terminal());
    }

    #[test]
    fn test_status_round_trips() {
        for status in ["draft", "active", "paused", "completed", "failed", "archived"] {
            let parsed: WorkflowStatus = status.parse().unwrap();
            assert_eq!(parsed.to_string(), status);
        }
        for status in ["pending", "processing", "processed", "failed", "cancelled"] {
            let parsed: EventStatus = status.parse().unwrap();
            assert_eq!(parsed.to_string(), status);
        }
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
