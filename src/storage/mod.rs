//! # Persistence Port
//!
//! The storage contract the core depends on but does not implement. Any
//! keyed store with per-record upsert (last-write-wins) satisfies it; no
//! multi-record transactions are required. [`InMemoryStore`] is the
//! reference implementation used by tests and embeddable hosts.

pub mod memory;

pub use memory::InMemoryStore;

use crate::error::Result;
use crate::models::{
    Event, EventHandlerRecord, EventRule, EventSubscriptionRecord, Execution, Role, Stage, Task,
    Workflow,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Keyed read/write access to the records the core coordinates over
///
/// `save_*` persists a new record, `update_*` upserts the full record with
/// last-write-wins semantics, `get_*` returns `None` for unknown ids.
/// Stages and roles are immutable after creation and carry no update
/// method; subscription and handler records are append-only bookkeeping.
#[async_trait]
pub trait PersistencePort: Send + Sync {
    // Workflows
    async fn save_workflow(&self, workflow: &Workflow) -> Result<()>;
    async fn get_workflow(&self, id: Uuid) -> Result<Option<Workflow>>;
    async fn update_workflow(&self, workflow: &Workflow) -> Result<()>;

    // Stages
    async fn save_stage(&self, stage: &Stage) -> Result<()>;
    async fn get_stage(&self, id: Uuid) -> Result<Option<Stage>>;
    /// Stages of a workflow, ordered by `order_index` ascending
    async fn list_stages(&self, workflow_id: Uuid) -> Result<Vec<Stage>>;

    // Roles
    async fn save_role(&self, role: &Role) -> Result<()>;
    async fn list_roles(&self, workflow_id: Uuid) -> Result<Vec<Role>>;

    // Tasks
    async fn save_task(&self, task: &Task) -> Result<()>;
    async fn get_task(&self, id: Uuid) -> Result<Option<Task>>;
    async fn update_task(&self, task: &Task) -> Result<()>;
    /// Tasks of a stage, ordered by position (creation order)
    async fn list_tasks(&self, stage_id: Uuid) -> Result<Vec<Task>>;

    // Events
    async fn save_event(&self, event: &Event) -> Result<()>;
    async fn get_event(&self, id: Uuid) -> Result<Option<Event>>;
    async fn update_event(&self, event: &Event) -> Result<()>;
    /// Failed events due for a retry: `next_retry_at <= now` and
    /// `retry_count < max_retries`
    async fn list_failed_events_retriable(&self, now: DateTime<Utc>) -> Result<Vec<Event>>;

    // Event rules
    async fn save_event_rule(&self, rule: &EventRule) -> Result<()>;
    async fn get_event_rule(&self, id: Uuid) -> Result<Option<EventRule>>;
    async fn update_event_rule(&self, rule: &EventRule) -> Result<()>;
    /// Active rules ordered by priority descending
    async fn list_active_event_rules(&self) -> Result<Vec<EventRule>>;

    // Executions
    async fn save_execution(&self, execution: &Execution) -> Result<()>;
    async fn get_execution(&self, id: Uuid) -> Result<Option<Execution>>;
    async fn update_execution(&self, execution: &Execution) -> Result<()>;

    // Observational bookkeeping
    async fn save_subscription(&self, record: &EventSubscriptionRecord) -> Result<()>;
    async fn save_handler_record(&self, record: &EventHandlerRecord) -> Result<()>;
}
