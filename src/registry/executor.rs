//! # Task Executor Registry
//!
//! Maps a task-type tag to the callable that performs the work. The
//! registry is not opinionated about what execution means; executors
//! return a result map that becomes the task's output. Absence of a
//! registered type is a fatal error for that task only.

use crate::error::{CoreError, Result};
use crate::models::Task;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// A callable that performs the work for one task type
///
/// The context map is the running execution's accumulated context, seeded
/// from the `start_workflow` input. The returned value is recorded as the
/// task's output.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: &Task, context: &Value) -> anyhow::Result<Value>;

    /// Executor name for logging and handler records
    fn executor_name(&self) -> &str {
        "unnamed_executor"
    }
}

/// Registry mapping task-type tags to executors
#[derive(Default)]
pub struct TaskExecutorRegistry {
    executors: DashMap<String, Arc<dyn TaskExecutor>>,
}

impl TaskExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor for a task type, replacing any existing one
    pub fn register(&self, task_type: impl Into<String>, executor: Arc<dyn TaskExecutor>) {
        let task_type = task_type.into();
        info!(
            task_type = %task_type,
            executor = executor.executor_name(),
            "Registered task executor"
        );
        self.executors.insert(task_type, executor);
    }

    /// Resolve the executor for a task type
    pub fn resolve(&self, task_type: &str) -> Result<Arc<dyn TaskExecutor>> {
        match self.executors.get(task_type) {
            Some(entry) => {
                debug!(task_type = %task_type, "Resolved task executor");
                Ok(entry.value().clone())
            }
            None => Err(CoreError::unknown_task_type(task_type)),
        }
    }

    /// Task types with a registered executor
    pub fn registered_types(&self) -> Vec<String> {
        self.executors.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

impl std::fmt::Debug for TaskExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutorRegistry")
            .field("registered_types", &self.registered_types())
            .finish()
    }
}
