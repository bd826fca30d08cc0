//! # Core Error Types
//!
//! Structured error handling for the orchestration core using thiserror
//! instead of `Box<dyn Error>` patterns.
//!
//! The taxonomy maps one-to-one onto the failure modes of the engine and
//! dispatcher: validation failures are rejected before any state change,
//! invalid-state failures leave the record untouched, handler failures are
//! isolated per handler, and dispatch failures drive the event retry cycle.

use thiserror::Error;

/// Errors produced by the orchestration core
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed create request, rejected before any state change
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// Operation attempted from a disallowed status
    #[error("Invalid state for {entity} {id}: {message}")]
    InvalidState {
        entity: String,
        id: String,
        message: String,
    },

    /// No executor registered for a task type
    #[error("No executor registered for task type: {task_type}")]
    UnknownTaskType { task_type: String },

    /// A subscribed event handler failed; isolated per handler
    #[error("Handler '{handler}' failed for event {event_id}: {message}")]
    Handler {
        handler: String,
        event_id: String,
        message: String,
    },

    /// A task executor returned an error; aborts the owning workflow run
    #[error("Task execution failed: {message}")]
    TaskExecution { message: String },

    /// Event processing failed before handler fan-out; feeds the retry loop
    #[error("Event dispatch failed: {message}")]
    DispatchFailure { message: String },

    /// Persistence port operation failed
    #[error("Persistence error: {operation}: {message}")]
    Persistence { operation: String, message: String },

    /// A record the operation depends on does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Configuration could not be loaded or parsed
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Unexpected internal failure (e.g. a panicked execution unit)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CoreError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an invalid-state error for an entity
    pub fn invalid_state(
        entity: impl Into<String>,
        id: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            entity: entity.into(),
            id: id.to_string(),
            message: message.into(),
        }
    }

    /// Create an unknown-task-type error
    pub fn unknown_task_type(task_type: impl Into<String>) -> Self {
        Self::UnknownTaskType {
            task_type: task_type.into(),
        }
    }

    /// Create a handler error
    pub fn handler(
        handler: impl Into<String>,
        event_id: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        Self::Handler {
            handler: handler.into(),
            event_id: event_id.to_string(),
            message: message.into(),
        }
    }

    /// Create a task-execution error
    pub fn task_execution(message: impl Into<String>) -> Self {
        Self::TaskExecution {
            message: message.into(),
        }
    }

    /// Create a dispatch failure
    pub fn dispatch_failure(message: impl Into<String>) -> Self {
        Self::DispatchFailure {
            message: message.into(),
        }
    }

    /// Create a persistence error
    pub fn persistence(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Persistence {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The message recorded on failed tasks and workflow-failure payloads.
    ///
    /// A raw executor error keeps its own text; everything else uses the
    /// full display form.
    pub fn failure_message(&self) -> String {
        match self {
            Self::TaskExecution { message } => message.clone(),
            other => other.to_string(),
        }
    }

    /// True when the error aborts an event before handler fan-out and
    /// should feed the retry cycle
    pub fn is_dispatch_failure(&self) -> bool {
        matches!(self, Self::DispatchFailure { .. })
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formats() {
        let err = CoreError::validation("workflow name is required");
        assert_eq!(
            err.to_string(),
            "Validation failed: workflow name is required"
        );

        let err = CoreError::unknown_task_type("ai_process");
        assert_eq!(
            err.to_string(),
            "No executor registered for task type: ai_process"
        );
    }

    #[test]
    fn test_dispatch_failure_classification() {
        assert!(CoreError::dispatch_failure("event not found").is_dispatch_failure());
        assert!(!CoreError::validation("nope").is_dispatch_failure());
    }
}
