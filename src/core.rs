//! # Unified Core Bootstrap
//!
//! Single-source-of-truth assembly for the orchestration core. All entry
//! points build the same component graph through [`CadenceCore`]: one
//! persistence port handle, one executor registry, one action registry,
//! one dispatcher, one engine. This keeps every registry an explicit field
//! on an instance constructed once at process start; there is no hidden
//! module-level mutable state anywhere in the core.
//!
//! Bootstrap also wires the fixed pieces the engine ships with:
//! - the lifecycle audit subscriber, logging every produced event
//! - the engine-backed `create_task` rule action, letting automations
//!   create follow-up tasks

use crate::config::CoreConfig;
use crate::constants::{actions as action_names, events};
use crate::dispatcher::{EventDispatcher, EventHandler};
use crate::engine::WorkflowEngine;
use crate::error::Result;
use crate::models::{Event, TaskSpec};
use crate::registry::{ActionHandler, ActionHandlerRegistry, RegistryStats, TaskExecutorRegistry};
use crate::storage::{InMemoryStore, PersistencePort};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Fixed subscriber registered at initialization: logs every lifecycle
/// event for audit purposes
struct LifecycleAuditHandler;

#[async_trait]
impl EventHandler for LifecycleAuditHandler {
    async fn handle_event(&self, event: &Event) -> anyhow::Result<Value> {
        let summary = event
            .payload
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("");
        if event.event_type.ends_with(".failed") {
            warn!(
                event_type = %event.event_type,
                workflow_id = ?event.workflow_id,
                task_id = ?event.task_id,
                summary,
                "Lifecycle event"
            );
        } else {
            info!(
                event_type = %event.event_type,
                workflow_id = ?event.workflow_id,
                task_id = ?event.task_id,
                summary,
                "Lifecycle event"
            );
        }
        Ok(json!({ "logged": true }))
    }

    fn handler_name(&self) -> &str {
        "lifecycle_audit"
    }
}

/// Engine-backed `create_task` rule action
///
/// Config keys: `stage_id` (required), `task_type` (required), `title`,
/// `input`, and `workflow_id` (falls back to the triggering event's
/// workflow link).
struct CreateTaskAction {
    engine: WorkflowEngine,
}

#[async_trait]
impl ActionHandler for CreateTaskAction {
    async fn execute(&self, event: &Event, config: &Value) -> anyhow::Result<()> {
        let workflow_id = config
            .get("workflow_id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .or(event.workflow_id)
            .ok_or_else(|| anyhow::anyhow!("create_task action requires a workflow id"))?;
        let stage_id = config
            .get("stage_id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| anyhow::anyhow!("create_task action requires a stage_id"))?;
        let task_type = config
            .get("task_type")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("create_task action requires a task_type"))?;
        let title = config
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("Follow-up task");

        let spec = TaskSpec::new(title, task_type)
            .with_input(config.get("input").cloned().unwrap_or(Value::Null));
        let task = self.engine.create_task(workflow_id, stage_id, spec).await?;
        info!(
            task_id = %task.id,
            workflow_id = %workflow_id,
            triggered_by = %event.id,
            "Rule action created follow-up task"
        );
        Ok(())
    }

    fn handler_name(&self) -> &str {
        "engine_create_task"
    }
}

/// Unified orchestration core that all entry points use
pub struct CadenceCore {
    pub store: Arc<dyn PersistencePort>,
    pub executors: Arc<TaskExecutorRegistry>,
    pub actions: Arc<ActionHandlerRegistry>,
    pub dispatcher: EventDispatcher,
    pub engine: WorkflowEngine,
}

impl CadenceCore {
    /// Bootstrap over the in-memory reference store
    pub async fn new(config: CoreConfig) -> Result<Self> {
        Self::with_store(Arc::new(InMemoryStore::new()), config).await
    }

    /// Bootstrap over a host-provided persistence port
    ///
    /// Builds the component graph, registers the fixed lifecycle
    /// subscribers and the engine-backed `create_task` action, and starts
    /// the dispatcher loops.
    pub async fn with_store(store: Arc<dyn PersistencePort>, config: CoreConfig) -> Result<Self> {
        let executors = Arc::new(TaskExecutorRegistry::new());
        let actions = Arc::new(ActionHandlerRegistry::with_builtin_actions());
        let dispatcher = EventDispatcher::new(store.clone(), actions.clone(), config.dispatcher);
        let engine = WorkflowEngine::new(
            store.clone(),
            dispatcher.clone(),
            executors.clone(),
            config.engine,
        );

        actions.register(
            action_names::CREATE_TASK,
            Arc::new(CreateTaskAction {
                engine: engine.clone(),
            }),
        );

        let audit: Arc<dyn EventHandler> = Arc::new(LifecycleAuditHandler);
        for event_type in events::ALL_LIFECYCLE_EVENTS {
            dispatcher
                .subscribe(event_type, audit.clone(), Value::Null)
                .await?;
        }

        dispatcher.start().await?;

        info!("Cadence core initialized");
        Ok(Self {
            store,
            executors,
            actions,
            dispatcher,
            engine,
        })
    }

    /// Bootstrap with short timers for tests
    pub async fn for_testing() -> Result<Self> {
        Self::new(CoreConfig::for_testing()).await
    }

    /// Snapshot of registry contents
    pub fn registry_stats(&self) -> RegistryStats {
        RegistryStats::snapshot(&self.executors, &self.actions)
    }

    /// Stop the dispatcher loops
    pub fn shutdown(&self) {
        self.dispatcher.shutdown();
    }
}
