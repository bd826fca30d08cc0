//! # Data Model
//!
//! The records the engine and dispatcher coordinate over: workflows with
//! their stages and roles, tasks, events and automation rules, executions,
//! and the observational subscription/handler bookkeeping. All records are
//! plain serde-derivable structs with uuid ids; durability is the
//! Persistence Port's concern.

pub mod event;
pub mod execution;
pub mod rule;
pub mod states;
pub mod task;
pub mod workflow;

// Re-export core models for easy access
pub use event::{Event, EventHandlerRecord, EventPriority, EventSpec, EventSubscriptionRecord};
pub use execution::Execution;
pub use rule::{ConditionOperator, EventRule, RuleAction, TriggerCondition};
pub use states::{EventStatus, ExecutionStatus, TaskStatus, WorkflowStatus};
pub use task::{Task, TaskSpec};
pub use workflow::{Role, RoleSpec, Stage, StageSpec, Workflow, WorkflowSpec};
