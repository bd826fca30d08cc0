#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Cadence Core
//!
//! Event-driven workflow orchestration core: the control plane that
//! coordinates multi-stage workflows and propagates state-change events to
//! subscribers and rule-driven automations.
//!
//! ## Architecture
//!
//! Two components carry the real coordination work, wired together by a
//! single bootstrap:
//!
//! - The **workflow engine** creates workflows (ordered stages plus named
//!   roles), starts and stops executions, walks stages in order running
//!   their tasks sequentially or in parallel, and emits lifecycle events.
//! - The **event dispatcher** is the pub/sub bus: it persists and queues
//!   events, fans them out to subscribed handlers, applies condition→action
//!   rules, and retries failed events with capped exponential backoff.
//!
//! Durability lives behind the [`storage::PersistencePort`] trait — any
//! keyed store with per-record upsert satisfies the core; an in-memory
//! reference implementation ships for tests and embedded use.
//!
//! ## Module Organization
//!
//! - [`models`] - Workflows, stages, roles, tasks, events, rules, executions
//! - [`storage`] - The persistence port contract and in-memory store
//! - [`registry`] - Task executor and rule action registries
//! - [`dispatcher`] - The event bus, rule engine, and retry loop
//! - [`engine`] - Workflow and stage/task execution
//! - [`core`] - Unified bootstrap wiring all of the above
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cadence_core::core::CadenceCore;
//! use cadence_core::config::CoreConfig;
//! use cadence_core::models::{StageSpec, TaskSpec, WorkflowSpec};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let core = CadenceCore::new(CoreConfig::default()).await?;
//!
//! let workflow = core
//!     .engine
//!     .create_workflow(WorkflowSpec {
//!         name: "content-pipeline".into(),
//!         description: "Collect then review".into(),
//!         stages: vec![StageSpec::new("collect"), StageSpec::new("review")],
//!         roles: vec![],
//!     })
//!     .await?;
//!
//! let stage_id = workflow.stage_ids[0];
//! core.engine
//!     .create_task(workflow.id, stage_id, TaskSpec::new("gather sources", "ai_process"))
//!     .await?;
//!
//! let execution_id = core
//!     .engine
//!     .start_workflow(workflow.id, json!({"topic": "rust"}))
//!     .await?;
//! println!("started execution {execution_id}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod core;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod registry;
pub mod storage;

pub use config::{CoreConfig, DispatcherConfig, EngineConfig};
pub use core::CadenceCore;
pub use dispatcher::{DispatcherStats, EventDispatcher, EventHandler};
pub use engine::{EngineStats, WorkflowEngine};
pub use error::{CoreError, Result};
pub use models::{
    ConditionOperator, Event, EventPriority, EventRule, EventSpec, EventStatus, Execution,
    ExecutionStatus, RuleAction, Stage, StageSpec, Task, TaskSpec, TaskStatus, TriggerCondition,
    Workflow, WorkflowSpec, WorkflowStatus,
};
pub use registry::{ActionHandler, ActionHandlerRegistry, TaskExecutor, TaskExecutorRegistry};
pub use storage::{InMemoryStore, PersistencePort};
