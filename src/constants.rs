//! # System Constants
//!
//! Core constants that define the operational boundaries of the Cadence
//! orchestration core: produced lifecycle event names, rule action names,
//! and retry/backoff defaults.

/// Lifecycle events produced by the workflow engine and consumed by
/// external subscribers (notification services, board visualization, ...)
pub mod events {
    // Workflow lifecycle events
    pub const WORKFLOW_CREATED: &str = "workflow.created";
    pub const WORKFLOW_STARTED: &str = "workflow.started";
    pub const WORKFLOW_PAUSED: &str = "workflow.paused";
    pub const WORKFLOW_COMPLETED: &str = "workflow.completed";
    pub const WORKFLOW_FAILED: &str = "workflow.failed";

    // Task lifecycle events
    pub const TASK_CREATED: &str = "task.created";
    pub const TASK_STARTED: &str = "task.started";
    pub const TASK_COMPLETED: &str = "task.completed";
    pub const TASK_FAILED: &str = "task.failed";
    pub const TASK_MOVED: &str = "task.moved";

    /// All lifecycle event names, for bulk subscription
    pub const ALL_LIFECYCLE_EVENTS: &[&str] = &[
        WORKFLOW_CREATED,
        WORKFLOW_STARTED,
        WORKFLOW_PAUSED,
        WORKFLOW_COMPLETED,
        WORKFLOW_FAILED,
        TASK_CREATED,
        TASK_STARTED,
        TASK_COMPLETED,
        TASK_FAILED,
        TASK_MOVED,
    ];
}

/// Named actions a fired event rule can invoke through the action
/// handler registry
pub mod actions {
    pub const CREATE_TASK: &str = "create_task";
    pub const SEND_NOTIFICATION: &str = "send_notification";
    pub const TRIGGER_WORKFLOW: &str = "trigger_workflow";
    pub const UPDATE_STATUS: &str = "update_status";
    pub const SEND_WEBHOOK: &str = "send_webhook";

    /// Actions the dispatcher pre-registers as safe no-ops
    pub const BUILTIN_ACTIONS: &[&str] = &[
        CREATE_TASK,
        SEND_NOTIFICATION,
        TRIGGER_WORKFLOW,
        UPDATE_STATUS,
        SEND_WEBHOOK,
    ];
}

/// System-wide defaults
pub mod system {
    /// Default maximum delivery attempts for an event
    pub const DEFAULT_EVENT_MAX_RETRIES: u32 = 3;

    /// Default maximum retries recorded on a task (bookkeeping only;
    /// the engine performs no automatic task-level retry)
    pub const DEFAULT_TASK_MAX_RETRIES: u32 = 3;

    /// Base delay for event retry backoff, in seconds
    pub const RETRY_BACKOFF_BASE_SECS: u64 = 30;

    /// Cap for event retry backoff, in seconds
    pub const RETRY_BACKOFF_MAX_SECS: u64 = 300;

    /// Cadence of the failed-event retry scan, in seconds
    pub const RETRY_SCAN_INTERVAL_SECS: u64 = 10;

    /// Default per-stage task cap when a stage does not set one
    pub const DEFAULT_STAGE_MAX_TASKS: u32 = 50;

    /// Version marker
    pub const CADENCE_CORE_VERSION: &str = "0.1.0";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_events_complete() {
        assert_eq!(events::ALL_LIFECYCLE_EVENTS.len(), 10);
        assert!(events::ALL_LIFECYCLE_EVENTS.contains(&events::WORKFLOW_FAILED));
        assert!(events::ALL_LIFECYCLE_EVENTS.contains(&events::TASK_MOVED));
    }

    #[test]
    fn test_builtin_actions() {
        assert_eq!(actions::BUILTIN_ACTIONS.len(), 5);
        assert!(actions::BUILTIN_ACTIONS.contains(&actions::CREATE_TASK));
    }
}
