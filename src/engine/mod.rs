//! # Workflow Engine
//!
//! The orchestration engine: creates workflows with their ordered stages
//! and named roles, starts and stops executions, walks stages in order
//! executing their tasks, and emits lifecycle events through the event
//! dispatcher.
//!
//! ## Execution contract
//!
//! Stages run strictly by ascending `order_index`. Within a stage, tasks
//! run concurrently when the stage is parallel, otherwise one at a time in
//! creation order. A single task failure aborts the entire run; workflows
//! requiring partial tolerance must model that through stage and task
//! design, not engine retry. Stopping is cooperative: the run loop checks
//! running-table membership between stages only, so an in-flight stage
//! runs to completion or failure before a stop takes effect.

use crate::config::EngineConfig;
use crate::constants::events;
use crate::dispatcher::EventDispatcher;
use crate::error::{CoreError, Result};
use crate::models::{
    EventSpec, Execution, ExecutionStatus, Role, Stage, Task, TaskSpec, TaskStatus, Workflow,
    WorkflowSpec, WorkflowStatus,
};
use crate::registry::TaskExecutorRegistry;
use crate::storage::PersistencePort;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Per-workflow entry in the in-memory running table
#[derive(Debug, Clone)]
struct RunningWorkflow {
    execution_id: Uuid,
    /// Context map seeded from the start input, passed to every executor
    context: Value,
}

/// Snapshot of engine activity
#[derive(Debug, Clone)]
pub struct EngineStats {
    pub running_workflows: usize,
    pub running_ids: Vec<Uuid>,
}

/// The workflow orchestration engine: cheaply cloneable handle over
/// shared state
#[derive(Clone)]
pub struct WorkflowEngine {
    store: Arc<dyn PersistencePort>,
    dispatcher: EventDispatcher,
    executors: Arc<TaskExecutorRegistry>,
    running: Arc<RwLock<HashMap<Uuid, RunningWorkflow>>>,
    config: EngineConfig,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn PersistencePort>,
        dispatcher: EventDispatcher,
        executors: Arc<TaskExecutorRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            executors,
            running: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Persist a workflow in Draft with its stages (order preserved) and
    /// roles, then emit `workflow.created`
    pub async fn create_workflow(&self, spec: WorkflowSpec) -> Result<Workflow> {
        if spec.name.trim().is_empty() {
            return Err(CoreError::validation("workflow name is required"));
        }

        let mut workflow = Workflow::new(spec.name, spec.description);

        for (index, stage_spec) in spec.stages.iter().enumerate() {
            let stage = Stage::new(
                workflow.id,
                stage_spec,
                index as u32,
                self.config.default_stage_max_tasks,
            );
            self.store.save_stage(&stage).await?;
            workflow.stage_ids.push(stage.id);
        }

        for role_spec in &spec.roles {
            let role = Role::new(workflow.id, role_spec);
            self.store.save_role(&role).await?;
            workflow.role_ids.push(role.id);
        }

        self.store.save_workflow(&workflow).await?;

        info!(
            workflow_id = %workflow.id,
            name = %workflow.name,
            stages = workflow.stage_ids.len(),
            roles = workflow.role_ids.len(),
            "Workflow created"
        );
        self.emit(
            events::WORKFLOW_CREATED,
            Some(workflow.id),
            None,
            json!({
                "workflow_id": workflow.id,
                "name": workflow.name,
                "message": format!("Workflow '{}' created", workflow.name),
            }),
        )
        .await;

        Ok(workflow)
    }

    /// Start a run: create an Execution, flip the workflow Active,
    /// register it in the running table, and spawn the stage loop.
    /// Returns the execution id immediately; running is asynchronous.
    pub async fn start_workflow(&self, workflow_id: Uuid, input: Value) -> Result<Uuid> {
        let mut workflow = self
            .store
            .get_workflow(workflow_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Workflow", workflow_id))?;

        if self.running.read().await.contains_key(&workflow_id) {
            return Err(CoreError::invalid_state(
                "Workflow",
                workflow_id,
                "workflow already has an active execution",
            ));
        }
        if !workflow.status.can_start() {
            return Err(CoreError::invalid_state(
                "Workflow",
                workflow_id,
                format!("cannot start from status '{}'", workflow.status),
            ));
        }

        let execution = Execution::new(workflow_id, input.clone());
        self.store.save_execution(&execution).await?;

        workflow.set_status(WorkflowStatus::Active);
        workflow.execution_count += 1;
        self.store.update_workflow(&workflow).await?;

        self.running.write().await.insert(
            workflow_id,
            RunningWorkflow {
                execution_id: execution.id,
                context: input,
            },
        );

        info!(
            workflow_id = %workflow_id,
            execution_id = %execution.id,
            "Workflow started"
        );
        self.emit(
            events::WORKFLOW_STARTED,
            Some(workflow_id),
            None,
            json!({
                "workflow_id": workflow_id,
                "execution_id": execution.id,
                "message": format!("Workflow '{}' started", workflow.name),
            }),
        )
        .await;

        let engine = self.clone();
        let execution_id = execution.id;
        tokio::spawn(async move { engine.run_workflow(workflow_id, execution_id).await });

        Ok(execution.id)
    }

    /// Cooperatively stop a running workflow
    ///
    /// Returns `Ok(false)` when the workflow has no active run (idempotent
    /// no-op). A stage already in progress runs to completion or failure;
    /// the run loop observes the stop at the next stage boundary.
    pub async fn stop_workflow(&self, workflow_id: Uuid) -> Result<bool> {
        let entry = self.running.write().await.remove(&workflow_id);
        let Some(entry) = entry else {
            return Ok(false);
        };

        if let Some(mut execution) = self.store.get_execution(entry.execution_id).await? {
            execution.finish(ExecutionStatus::Stopped, None);
            self.store.update_execution(&execution).await?;
        }

        let mut workflow_name = String::new();
        if let Some(mut workflow) = self.store.get_workflow(workflow_id).await? {
            workflow.set_status(WorkflowStatus::Paused);
            workflow_name = workflow.name.clone();
            self.store.update_workflow(&workflow).await?;
        }

        info!(
            workflow_id = %workflow_id,
            execution_id = %entry.execution_id,
            "Workflow stopped"
        );
        self.emit(
            events::WORKFLOW_PAUSED,
            Some(workflow_id),
            None,
            json!({
                "workflow_id": workflow_id,
                "execution_id": entry.execution_id,
                "message": format!("Workflow '{workflow_name}' paused"),
            }),
        )
        .await;

        Ok(true)
    }

    /// Create a task in a stage and emit `task.created`
    pub async fn create_task(
        &self,
        workflow_id: Uuid,
        stage_id: Uuid,
        spec: TaskSpec,
    ) -> Result<Task> {
        if spec.task_type.trim().is_empty() {
            return Err(CoreError::validation("task type is required"));
        }

        let stage = self
            .store
            .get_stage(stage_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Stage", stage_id))?;
        if stage.workflow_id != workflow_id {
            return Err(CoreError::validation(format!(
                "stage {stage_id} does not belong to workflow {workflow_id}"
            )));
        }

        let existing = self.store.list_tasks(stage_id).await?;
        if existing.len() as u32 >= stage.max_tasks {
            return Err(CoreError::validation(format!(
                "stage '{}' is at its task limit ({})",
                stage.name, stage.max_tasks
            )));
        }

        let task = Task::new(
            workflow_id,
            stage_id,
            spec,
            existing.len() as u32,
            self.config.default_task_max_retries,
        );
        self.store.save_task(&task).await?;

        info!(
            task_id = %task.id,
            workflow_id = %workflow_id,
            stage_id = %stage_id,
            task_type = %task.task_type,
            "Task created"
        );
        self.emit(
            events::TASK_CREATED,
            Some(workflow_id),
            Some(task.id),
            json!({
                "workflow_id": workflow_id,
                "task_id": task.id,
                "title": task.title,
                "message": format!("Task '{}' created", task.title),
            }),
        )
        .await;

        Ok(task)
    }

    /// Move a task to another stage/position and emit `task.moved`
    pub async fn move_task(
        &self,
        task_id: Uuid,
        target_stage_id: Uuid,
        position: u32,
    ) -> Result<Task> {
        let mut task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Task", task_id))?;

        let target = self
            .store
            .get_stage(target_stage_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Stage", target_stage_id))?;
        if target.workflow_id != task.workflow_id {
            return Err(CoreError::validation(format!(
                "stage {target_stage_id} does not belong to workflow {}",
                task.workflow_id
            )));
        }

        let from_stage = task.stage_id;
        task.stage_id = target_stage_id;
        task.position = position;
        task.updated_at = chrono::Utc::now();
        self.store.update_task(&task).await?;

        debug!(
            task_id = %task_id,
            from = %from_stage,
            to = %target_stage_id,
            position,
            "Task moved"
        );
        self.emit(
            events::TASK_MOVED,
            Some(task.workflow_id),
            Some(task.id),
            json!({
                "workflow_id": task.workflow_id,
                "task_id": task.id,
                "from_stage": from_stage,
                "to_stage": target_stage_id,
                "position": position,
                "message": format!("Task '{}' moved", task.title),
            }),
        )
        .await;

        Ok(task)
    }

    /// Execute one task through its registered executor
    ///
    /// Requires the task in Todo. On success the task lands Done with its
    /// output recorded; on failure it lands Blocked with the error and an
    /// incremented retry count, and the error propagates to the caller.
    pub async fn execute_task(&self, task_id: Uuid, context: Value) -> Result<Value> {
        let mut task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Task", task_id))?;

        if !task.status.is_executable() {
            return Err(CoreError::invalid_state(
                "Task",
                task_id,
                format!("cannot execute from status '{}'", task.status),
            ));
        }

        task.begin();
        self.store.update_task(&task).await?;
        self.emit(
            events::TASK_STARTED,
            Some(task.workflow_id),
            Some(task.id),
            json!({
                "workflow_id": task.workflow_id,
                "task_id": task.id,
                "title": task.title,
                "message": format!("Task '{}' started", task.title),
            }),
        )
        .await;

        let outcome = match self.executors.resolve(&task.task_type) {
            Ok(executor) => executor
                .execute(&task, &context)
                .await
                .map_err(|e| CoreError::task_execution(e.to_string())),
            Err(error) => Err(error),
        };

        match outcome {
            Ok(output) => {
                task.complete(output.clone());
                self.store.update_task(&task).await?;
                info!(
                    task_id = %task.id,
                    task_type = %task.task_type,
                    duration_ms = task.duration_ms,
                    "Task completed"
                );
                self.emit(
                    events::TASK_COMPLETED,
                    Some(task.workflow_id),
                    Some(task.id),
                    json!({
                        "workflow_id": task.workflow_id,
                        "task_id": task.id,
                        "title": task.title,
                        "message": format!("Task '{}' completed", task.title),
                    }),
                )
                .await;
                Ok(output)
            }
            Err(error) => {
                let message = error.failure_message();
                task.fail(message.clone());
                self.store.update_task(&task).await?;
                warn!(
                    task_id = %task.id,
                    task_type = %task.task_type,
                    error = %message,
                    "Task failed"
                );
                self.emit(
                    events::TASK_FAILED,
                    Some(task.workflow_id),
                    Some(task.id),
                    json!({
                        "workflow_id": task.workflow_id,
                        "task_id": task.id,
                        "title": task.title,
                        "error": message,
                        "message": format!("Task '{}' failed", task.title),
                    }),
                )
                .await;
                Err(error)
            }
        }
    }

    /// True when the workflow has an entry in the running table
    pub async fn is_running(&self, workflow_id: Uuid) -> bool {
        self.running.read().await.contains_key(&workflow_id)
    }

    /// Snapshot of engine activity
    pub async fn stats(&self) -> EngineStats {
        let running = self.running.read().await;
        EngineStats {
            running_workflows: running.len(),
            running_ids: running.keys().copied().collect(),
        }
    }

    async fn run_workflow(self, workflow_id: Uuid, execution_id: Uuid) {
        match self.execute_stages(workflow_id).await {
            Ok(()) => {
                if let Err(error) = self.finish_run_completed(workflow_id, execution_id).await {
                    error!(
                        workflow_id = %workflow_id,
                        error = %error,
                        "Failed to record workflow completion"
                    );
                }
            }
            Err(run_error) => {
                if let Err(error) = self
                    .finish_run_failed(workflow_id, execution_id, &run_error)
                    .await
                {
                    error!(
                        workflow_id = %workflow_id,
                        error = %error,
                        "Failed to record workflow failure"
                    );
                }
            }
        }
    }

    /// Walk stages by ascending order index, checking for a cooperative
    /// stop between stages
    async fn execute_stages(&self, workflow_id: Uuid) -> Result<()> {
        let stages = self.store.list_stages(workflow_id).await?;

        for stage in stages {
            if !self.is_running(workflow_id).await {
                info!(
                    workflow_id = %workflow_id,
                    stage = %stage.name,
                    "Run stopped before stage; exiting"
                );
                return Ok(());
            }
            self.execute_stage(workflow_id, &stage).await?;
        }
        Ok(())
    }

    async fn execute_stage(&self, workflow_id: Uuid, stage: &Stage) -> Result<()> {
        // Tasks already terminal (e.g. completed before a stop) are not
        // re-executed on restart
        let tasks: Vec<Task> = self
            .store
            .list_tasks(stage.id)
            .await?
            .into_iter()
            .filter(|task| !task.status.is_terminal())
            .collect();
        let context = self
            .running
            .read()
            .await
            .get(&workflow_id)
            .map(|entry| entry.context.clone())
            .unwrap_or(Value::Null);

        info!(
            workflow_id = %workflow_id,
            stage = %stage.name,
            order_index = stage.order_index,
            parallel = stage.is_parallel,
            tasks = tasks.len(),
            "Executing stage"
        );

        if stage.is_parallel {
            // Detached spawns: the first observed failure aborts the run,
            // but already-running siblings continue to their own terminal
            // status
            let handles: Vec<_> = tasks
                .into_iter()
                .map(|task| {
                    let engine = self.clone();
                    let context = context.clone();
                    tokio::spawn(async move { engine.execute_task(task.id, context).await })
                })
                .collect();

            for handle in handles {
                match handle.await {
                    Ok(Ok(_)) => {}
                    Ok(Err(error)) => return Err(error),
                    Err(join_error) => {
                        return Err(CoreError::internal(format!(
                            "task execution unit panicked: {join_error}"
                        )))
                    }
                }
            }
        } else {
            for task in tasks {
                self.execute_task(task.id, context.clone()).await?;
            }
        }
        Ok(())
    }

    async fn finish_run_completed(&self, workflow_id: Uuid, execution_id: Uuid) -> Result<()> {
        // A stop that landed during the final stage already finalized the
        // execution; completion bookkeeping only runs while still registered
        if self.running.write().await.remove(&workflow_id).is_none() {
            return Ok(());
        }

        let (tasks_total, tasks_completed) = self.count_tasks(workflow_id).await?;

        if let Some(mut execution) = self.store.get_execution(execution_id).await? {
            execution.tasks_total = tasks_total;
            execution.tasks_completed = tasks_completed;
            execution.finish(ExecutionStatus::Completed, None);
            self.store.update_execution(&execution).await?;
        }

        let mut workflow_name = String::new();
        if let Some(mut workflow) = self.store.get_workflow(workflow_id).await? {
            workflow.set_status(WorkflowStatus::Completed);
            workflow.success_count += 1;
            workflow_name = workflow.name.clone();
            self.store.update_workflow(&workflow).await?;
        }

        info!(
            workflow_id = %workflow_id,
            execution_id = %execution_id,
            tasks_completed,
            "Workflow completed"
        );
        self.emit(
            events::WORKFLOW_COMPLETED,
            Some(workflow_id),
            None,
            json!({
                "workflow_id": workflow_id,
                "execution_id": execution_id,
                "tasks_completed": tasks_completed,
                "message": format!("Workflow '{workflow_name}' completed"),
            }),
        )
        .await;
        Ok(())
    }

    async fn finish_run_failed(
        &self,
        workflow_id: Uuid,
        execution_id: Uuid,
        run_error: &CoreError,
    ) -> Result<()> {
        if self.running.write().await.remove(&workflow_id).is_none() {
            return Ok(());
        }

        let message = run_error.failure_message();
        let (tasks_total, tasks_completed) = self.count_tasks(workflow_id).await?;

        if let Some(mut execution) = self.store.get_execution(execution_id).await? {
            execution.tasks_total = tasks_total;
            execution.tasks_completed = tasks_completed;
            execution.finish(ExecutionStatus::Failed, Some(message.clone()));
            self.store.update_execution(&execution).await?;
        }

        let mut workflow_name = String::new();
        if let Some(mut workflow) = self.store.get_workflow(workflow_id).await? {
            workflow.set_status(WorkflowStatus::Failed);
            workflow.failure_count += 1;
            workflow_name = workflow.name.clone();
            self.store.update_workflow(&workflow).await?;
        }

        warn!(
            workflow_id = %workflow_id,
            execution_id = %execution_id,
            error = %message,
            "Workflow failed"
        );
        self.emit(
            events::WORKFLOW_FAILED,
            Some(workflow_id),
            None,
            json!({
                "workflow_id": workflow_id,
                "execution_id": execution_id,
                "error": message,
                "message": format!("Workflow '{workflow_name}' failed"),
            }),
        )
        .await;
        Ok(())
    }

    async fn count_tasks(&self, workflow_id: Uuid) -> Result<(u32, u32)> {
        let mut total = 0u32;
        let mut completed = 0u32;
        for stage in self.store.list_stages(workflow_id).await? {
            for task in self.store.list_tasks(stage.id).await? {
                total += 1;
                if task.status == TaskStatus::Done {
                    completed += 1;
                }
            }
        }
        Ok((total, completed))
    }

    /// Emit a lifecycle event; emission failures are logged, never fatal
    async fn emit(
        &self,
        event_type: &str,
        workflow_id: Option<Uuid>,
        task_id: Option<Uuid>,
        payload: Value,
    ) {
        let mut spec = EventSpec::new(event_type).with_payload(payload);
        spec.workflow_id = workflow_id;
        spec.task_id = task_id;
        if let Err(error) = self.dispatcher.dispatch(spec).await {
            warn!(
                event_type = %event_type,
                error = %error,
                "Failed to emit lifecycle event"
            );
        }
    }
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("config", &self.config)
            .finish()
    }
}
