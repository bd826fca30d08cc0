//! # Execution Model
//!
//! One record per start of a workflow. A workflow has at most one active
//! execution, tracked by the engine's in-memory running table; starting an
//! already-active workflow is rejected before a record is created.

use super::states::ExecutionStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One concrete run instance of a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: ExecutionStatus,
    pub input: Value,
    pub output: Value,
    pub error: Option<String>,
    pub tasks_total: u32,
    pub tasks_completed: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

impl Execution {
    /// Create a new running execution for a workflow
    pub fn new(workflow_id: Uuid, input: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            status: ExecutionStatus::Running,
            input,
            output: Value::Null,
            error: None,
            tasks_total: 0,
            tasks_completed: 0,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
        }
    }

    /// Close the execution in a terminal status, stamping duration
    pub fn finish(&mut self, status: ExecutionStatus, error: Option<String>) {
        let now = Utc::now();
        self.status = status;
        self.error = error;
        self.completed_at = Some(now);
        self.duration_ms = Some((now - self.started_at).num_milliseconds());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_execution_is_running() {
        let execution = Execution::new(Uuid::new_v4(), json!({"topic": "rust"}));
        assert_eq!(execution.status, ExecutionStatus::Running);
        assert!(execution.completed_at.is_none());
    }

    #[test]
    fn test_finish_stamps_duration() {
        let mut execution = Execution::new(Uuid::new_v4(), Value::Null);
        execution.finish(ExecutionStatus::Failed, Some("task exploded".into()));
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(execution.error.as_deref(), Some("task exploded"));
        assert!(execution.duration_ms.unwrap() >= 0);
    }
}
