//! # Event Model
//!
//! An immutable fact about a state change, delivered to subscribers and
//! evaluated against automation rules. Events are persisted before they
//! enter the delivery queue and are never destroyed; terminal states are
//! kept for audit.
//!
//! `priority` is stored and carried on queue entries as advisory metadata;
//! the delivery queue itself is plain FIFO.

use super::states::EventStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Advisory priority tag recorded on events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// Request payload for dispatching an event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSpec {
    pub event_type: String,
    #[serde(default)]
    pub workflow_id: Option<Uuid>,
    #[serde(default)]
    pub task_id: Option<Uuid>,
    #[serde(default)]
    pub board_id: Option<Uuid>,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub context: Value,
    #[serde(default)]
    pub priority: EventPriority,
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl EventSpec {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            workflow_id: None,
            task_id: None,
            board_id: None,
            payload: Value::Null,
            context: Value::Null,
            priority: EventPriority::Normal,
            max_retries: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    pub fn with_workflow(mut self, workflow_id: Uuid) -> Self {
        self.workflow_id = Some(workflow_id);
        self
    }

    pub fn with_task(mut self, task_id: Uuid) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn with_priority(mut self, priority: EventPriority) -> Self {
        self.priority = priority;
        self
    }
}

/// A persisted state-change notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub event_type: String,
    pub workflow_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub board_id: Option<Uuid>,
    pub payload: Value,
    pub context: Value,
    pub status: EventStatus,
    pub priority: EventPriority,
    pub retry_count: u32,
    pub max_retries: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub processing_duration_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Create a new event record in Pending
    pub fn new(spec: EventSpec, default_max_retries: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            event_type: spec.event_type,
            workflow_id: spec.workflow_id,
            task_id: spec.task_id,
            board_id: spec.board_id,
            payload: spec.payload,
            context: spec.context,
            status: EventStatus::Pending,
            priority: spec.priority,
            retry_count: 0,
            max_retries: spec.max_retries.unwrap_or(default_max_retries),
            next_retry_at: None,
            error: None,
            processing_duration_ms: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when the retry loop may re-enqueue this event
    pub fn is_retriable_at(&self, now: DateTime<Utc>) -> bool {
        self.status == EventStatus::Failed
            && self.retry_count < self.max_retries
            && self
                .next_retry_at
                .map(|at| at <= now)
                .unwrap_or(false)
    }
}

/// Observational record of a subscription; not used for control flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSubscriptionRecord {
    pub id: Uuid,
    pub event_type: String,
    pub handler_name: String,
    pub config: Value,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl EventSubscriptionRecord {
    pub fn new(event_type: impl Into<String>, handler_name: impl Into<String>, config: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            handler_name: handler_name.into(),
            config,
            active: true,
            created_at: Utc::now(),
        }
    }
}

/// Observational record of one handler invocation for one event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventHandlerRecord {
    pub id: Uuid,
    pub event_id: Uuid,
    pub handler_name: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: i64,
    pub executed_at: DateTime<Utc>,
}
