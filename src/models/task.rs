//! # Task Model
//!
//! One unit of work within a stage, resolved to an executor by its
//! `task_type` tag. Tasks move Todo → InProgress → {Done | Blocked};
//! Blocked is terminal for the engine. The retry bookkeeping fields are
//! recorded for observability but never drive automatic re-execution.

use super::states::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Request payload for creating a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub title: String,
    pub task_type: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub depends_on: Vec<Uuid>,
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl TaskSpec {
    pub fn new(title: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            task_type: task_type.into(),
            input: Value::Null,
            depends_on: Vec::new(),
            max_retries: None,
        }
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }
}

/// One unit of work with a type tag resolved to an executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub stage_id: Uuid,
    pub title: String,
    pub task_type: String,
    pub status: TaskStatus,
    pub input: Value,
    pub output: Value,
    pub error: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub depends_on: Vec<Uuid>,
    /// Creation order within the stage; drives sequential execution order
    pub position: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

impl Task {
    /// Create a new task record in Todo
    pub fn new(
        workflow_id: Uuid,
        stage_id: Uuid,
        spec: TaskSpec,
        position: u32,
        default_max_retries: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            stage_id,
            title: spec.title,
            task_type: spec.task_type,
            status: TaskStatus::Todo,
            input: spec.input,
            output: Value::Null,
            error: None,
            retry_count: 0,
            max_retries: spec.max_retries.unwrap_or(default_max_retries),
            depends_on: spec.depends_on,
            position,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            duration_ms: None,
        }
    }

    /// Mark the task as started
    pub fn begin(&mut self) {
        let now = Utc::now();
        self.status = TaskStatus::InProgress;
        self.started_at = Some(now);
        self.updated_at = now;
    }

    /// Mark the task as completed with its output
    pub fn complete(&mut self, output: Value) {
        let now = Utc::now();
        self.status = TaskStatus::Done;
        self.output = output;
        self.completed_at = Some(now);
        self.duration_ms = self
            .started_at
            .map(|started| (now - started).num_milliseconds());
        self.updated_at = now;
    }

    /// Mark the task as failed; counts the attempt
    pub fn fail(&mut self, error: impl Into<String>) {
        let now = Utc::now();
        self.status = TaskStatus::Blocked;
        self.error = Some(error.into());
        self.retry_count += 1;
        self.completed_at = Some(now);
        self.duration_ms = self
            .started_at
            .map(|started| (now - started).num_milliseconds());
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_task_starts_todo() {
        let task = Task::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            TaskSpec::new("summarize document", "ai_process"),
            0,
            3,
        );
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.retry_count, 0);
        assert_eq!(task.max_retries, 3);
        assert!(task.started_at.is_none());
    }

    #[test]
    fn test_complete_records_output_and_duration() {
        let mut task = Task::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            TaskSpec::new("t", "noop"),
            0,
            3,
        );
        task.begin();
        task.complete(json!({"summary": "ok"}));
        assert_eq!(task.status, TaskStatus::Done);
        assert_eq!(task.output, json!({"summary": "ok"}));
        assert!(task.duration_ms.unwrap() >= 0);
    }

    #[test]
    fn test_fail_increments_retry_count_once() {
        let mut task = Task::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            TaskSpec::new("t", "flaky"),
            0,
            3,
        );
        task.begin();
        task.fail("executor exploded");
        assert_eq!(task.status, TaskStatus::Blocked);
        assert_eq!(task.retry_count, 1);
        assert_eq!(task.error.as_deref(), Some("executor exploded"));
    }
}
