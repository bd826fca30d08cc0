//! # Registry Infrastructure
//!
//! Tagged-variant registries at the core's pluggable seams: task-type →
//! executor for the workflow engine, and action name → handler for the
//! rule engine. Both are narrow trait-object maps keyed by string tag,
//! constructed once and shared by handle.

pub mod actions;
pub mod executor;

pub use actions::{ActionHandler, ActionHandlerRegistry};
pub use executor::{TaskExecutor, TaskExecutorRegistry};

/// Snapshot of registry contents for observability
#[derive(Debug, Clone)]
pub struct RegistryStats {
    pub total_executors: usize,
    pub total_actions: usize,
    pub task_types: Vec<String>,
    pub action_names: Vec<String>,
}

impl RegistryStats {
    pub fn snapshot(
        executors: &TaskExecutorRegistry,
        actions: &ActionHandlerRegistry,
    ) -> Self {
        Self {
            total_executors: executors.len(),
            total_actions: actions.len(),
            task_types: executors.registered_types(),
            action_names: actions.registered_actions(),
        }
    }
}
