//! Integration tests for the workflow engine: lifecycle event ordering,
//! state-gating, stage ordering, parallel failure semantics, and
//! cooperative stop/restart.

mod common;

use cadence_core::config::CoreConfig;
use cadence_core::core::CadenceCore;
use cadence_core::error::CoreError;
use cadence_core::models::{
    EventStatus, ExecutionStatus, StageSpec, TaskSpec, TaskStatus, WorkflowSpec, WorkflowStatus,
};
use cadence_core::storage::{InMemoryStore, PersistencePort};
use common::doubles::{FailOnTitleExecutor, OrderTrackingExecutor};
use common::wait::wait_until;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

async fn test_core() -> (Arc<InMemoryStore>, CadenceCore) {
    let store = Arc::new(InMemoryStore::new());
    let core = CadenceCore::with_store(store.clone(), CoreConfig::for_testing())
        .await
        .expect("bootstrap failed");
    (store, core)
}

fn two_stage_spec(first: &str, second: &str) -> WorkflowSpec {
    WorkflowSpec {
        name: "content-pipeline".into(),
        description: String::new(),
        stages: vec![StageSpec::new(first), StageSpec::new(second)],
        roles: vec![],
    }
}

async fn workflow_status(store: &InMemoryStore, workflow_id: Uuid) -> WorkflowStatus {
    store
        .get_workflow(workflow_id)
        .await
        .unwrap()
        .unwrap()
        .status
}

#[tokio::test]
async fn test_two_stage_run_emits_lifecycle_events_in_order() {
    let (store, core) = test_core().await;
    let log = Arc::new(Mutex::new(Vec::new()));
    core.executors
        .register("ai_process", Arc::new(OrderTrackingExecutor::new(log)));

    let workflow = core
        .engine
        .create_workflow(two_stage_spec("collect", "review"))
        .await
        .unwrap();
    let collect_task = core
        .engine
        .create_task(
            workflow.id,
            workflow.stage_ids[0],
            TaskSpec::new("gather sources", "ai_process"),
        )
        .await
        .unwrap();
    let review_task = core
        .engine
        .create_task(
            workflow.id,
            workflow.stage_ids[1],
            TaskSpec::new("review draft", "ai_process"),
        )
        .await
        .unwrap();

    let execution_id = core
        .engine
        .start_workflow(workflow.id, json!({"topic": "rust"}))
        .await
        .unwrap();

    assert!(
        wait_until(2000, || async {
            store
                .all_events()
                .await
                .iter()
                .any(|e| e.event_type == "workflow.completed")
        })
        .await,
        "workflow did not complete in time"
    );

    assert_eq!(workflow_status(&store, workflow.id).await, WorkflowStatus::Completed);
    let execution = store.get_execution(execution_id).await.unwrap().unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.tasks_total, 2);
    assert_eq!(execution.tasks_completed, 2);

    // Emission order: sort persisted events by creation time and keep the
    // lifecycle sequence the scenario names
    let mut events = store.all_events().await;
    events.sort_by_key(|e| e.created_at);
    let sequence: Vec<(String, Option<Uuid>)> = events
        .iter()
        .filter(|e| {
            matches!(
                e.event_type.as_str(),
                "workflow.created"
                    | "workflow.started"
                    | "task.started"
                    | "task.completed"
                    | "workflow.completed"
            )
        })
        .map(|e| (e.event_type.clone(), e.task_id))
        .collect();

    assert_eq!(
        sequence,
        vec![
            ("workflow.created".to_string(), None),
            ("workflow.started".to_string(), None),
            ("task.started".to_string(), Some(collect_task.id)),
            ("task.completed".to_string(), Some(collect_task.id)),
            ("task.started".to_string(), Some(review_task.id)),
            ("task.completed".to_string(), Some(review_task.id)),
            ("workflow.completed".to_string(), None),
        ]
    );

    core.shutdown();
}

#[tokio::test]
async fn test_start_rejected_outside_draft_or_paused() {
    let (store, core) = test_core().await;
    let log = Arc::new(Mutex::new(Vec::new()));
    core.executors.register(
        "slow",
        Arc::new(OrderTrackingExecutor::with_delay(
            log,
            Duration::from_millis(200),
        )),
    );

    let workflow = core
        .engine
        .create_workflow(WorkflowSpec {
            name: "one-shot".into(),
            description: String::new(),
            stages: vec![StageSpec::new("only")],
            roles: vec![],
        })
        .await
        .unwrap();
    core.engine
        .create_task(
            workflow.id,
            workflow.stage_ids[0],
            TaskSpec::new("sleepy", "slow"),
        )
        .await
        .unwrap();

    core.engine
        .start_workflow(workflow.id, json!({}))
        .await
        .unwrap();

    // Second start while Active: rejected with no state mutated
    let err = core
        .engine
        .start_workflow(workflow.id, json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidState { .. }));
    let loaded = store.get_workflow(workflow.id).await.unwrap().unwrap();
    assert_eq!(loaded.execution_count, 1);

    assert!(
        wait_until(2000, || async {
            workflow_status(&store, workflow.id).await == WorkflowStatus::Completed
        })
        .await
    );

    // Completed is terminal for starting as well
    let err = core
        .engine
        .start_workflow(workflow.id, json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidState { .. }));

    core.shutdown();
}

#[tokio::test]
async fn test_unknown_task_type_blocks_task_and_fails_workflow() {
    let (store, core) = test_core().await;

    let workflow = core
        .engine
        .create_workflow(WorkflowSpec {
            name: "mystery".into(),
            description: String::new(),
            stages: vec![StageSpec::new("only")],
            roles: vec![],
        })
        .await
        .unwrap();
    let task = core
        .engine
        .create_task(
            workflow.id,
            workflow.stage_ids[0],
            TaskSpec::new("untyped", "never_registered"),
        )
        .await
        .unwrap();

    core.engine
        .start_workflow(workflow.id, json!({}))
        .await
        .unwrap();

    assert!(
        wait_until(2000, || async {
            workflow_status(&store, workflow.id).await == WorkflowStatus::Failed
        })
        .await
    );

    let task = store.get_task(task.id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Blocked);
    assert_eq!(task.retry_count, 1);
    let task_error = task.error.unwrap();
    assert_eq!(
        task_error,
        "No executor registered for task type: never_registered"
    );

    // The workflow failure carries the task's error verbatim
    assert!(
        wait_until(2000, || async {
            store
                .all_events()
                .await
                .iter()
                .any(|e| e.event_type == "workflow.failed")
        })
        .await
    );
    let events = store.all_events().await;
    let failed = events
        .iter()
        .find(|e| e.event_type == "workflow.failed")
        .unwrap();
    assert_eq!(
        failed.payload.get("error").and_then(|v| v.as_str()),
        Some(task_error.as_str())
    );

    core.shutdown();
}

#[tokio::test]
async fn test_parallel_stage_first_failure_aborts_run() {
    let (store, core) = test_core().await;
    core.executors.register(
        "mixed",
        Arc::new(
            FailOnTitleExecutor::new("task-2", "task 2 exploded")
                .with_success_delay(Duration::from_millis(50)),
        ),
    );

    let workflow = core
        .engine
        .create_workflow(WorkflowSpec {
            name: "fan-out".into(),
            description: String::new(),
            stages: vec![StageSpec::parallel("parallel")],
            roles: vec![],
        })
        .await
        .unwrap();
    let stage_id = workflow.stage_ids[0];
    let mut task_ids = Vec::new();
    for title in ["task-1", "task-2", "task-3"] {
        let task = core
            .engine
            .create_task(workflow.id, stage_id, TaskSpec::new(title, "mixed"))
            .await
            .unwrap();
        task_ids.push(task.id);
    }

    core.engine
        .start_workflow(workflow.id, json!({}))
        .await
        .unwrap();

    assert!(
        wait_until(2000, || async {
            workflow_status(&store, workflow.id).await == WorkflowStatus::Failed
        })
        .await
    );

    let failed_task = store.get_task(task_ids[1]).await.unwrap().unwrap();
    assert_eq!(failed_task.status, TaskStatus::Blocked);
    assert_eq!(failed_task.error.as_deref(), Some("task 2 exploded"));

    // Siblings were already dispatched; they run to their own terminal
    // status even though the run aborted
    assert!(
        wait_until(2000, || async {
            let one = store.get_task(task_ids[0]).await.unwrap().unwrap();
            let three = store.get_task(task_ids[2]).await.unwrap().unwrap();
            one.status == TaskStatus::Done && three.status == TaskStatus::Done
        })
        .await
    );

    assert!(
        wait_until(2000, || async {
            store
                .all_events()
                .await
                .iter()
                .any(|e| e.event_type == "workflow.failed")
        })
        .await
    );
    let events = store.all_events().await;
    let failed = events
        .iter()
        .find(|e| e.event_type == "workflow.failed")
        .unwrap();
    assert_eq!(
        failed.payload.get("error").and_then(|v| v.as_str()),
        Some("task 2 exploded")
    );

    let loaded = store.get_workflow(workflow.id).await.unwrap().unwrap();
    assert_eq!(loaded.failure_count, 1);

    core.shutdown();
}

#[tokio::test]
async fn test_later_stage_never_starts_before_earlier_stage_finishes() {
    let (store, core) = test_core().await;
    let log = Arc::new(Mutex::new(Vec::new()));
    core.executors.register(
        "tracked",
        Arc::new(OrderTrackingExecutor::with_delay(
            log.clone(),
            Duration::from_millis(20),
        )),
    );

    let workflow = core
        .engine
        .create_workflow(WorkflowSpec {
            name: "ordered".into(),
            description: String::new(),
            stages: vec![StageSpec::new("first"), StageSpec::parallel("second")],
            roles: vec![],
        })
        .await
        .unwrap();
    for title in ["a-1", "a-2"] {
        core.engine
            .create_task(workflow.id, workflow.stage_ids[0], TaskSpec::new(title, "tracked"))
            .await
            .unwrap();
    }
    for title in ["b-1", "b-2"] {
        core.engine
            .create_task(workflow.id, workflow.stage_ids[1], TaskSpec::new(title, "tracked"))
            .await
            .unwrap();
    }

    core.engine
        .start_workflow(workflow.id, json!({}))
        .await
        .unwrap();

    assert!(
        wait_until(2000, || async {
            workflow_status(&store, workflow.id).await == WorkflowStatus::Completed
        })
        .await
    );

    let order = log.lock().unwrap().clone();
    assert_eq!(order.len(), 4);
    // Sequential stage runs in creation order
    assert_eq!(&order[..2], &["a-1".to_string(), "a-2".to_string()]);
    // Parallel stage tasks come strictly after, in either order
    assert!(order[2..].contains(&"b-1".to_string()));
    assert!(order[2..].contains(&"b-2".to_string()));

    core.shutdown();
}

#[tokio::test]
async fn test_stop_is_cooperative_and_restart_resumes() {
    let (store, core) = test_core().await;
    let log = Arc::new(Mutex::new(Vec::new()));
    core.executors.register(
        "slow",
        Arc::new(OrderTrackingExecutor::with_delay(
            log,
            Duration::from_millis(150),
        )),
    );

    let workflow = core
        .engine
        .create_workflow(two_stage_spec("first", "second"))
        .await
        .unwrap();
    let first_task = core
        .engine
        .create_task(workflow.id, workflow.stage_ids[0], TaskSpec::new("one", "slow"))
        .await
        .unwrap();
    let second_task = core
        .engine
        .create_task(workflow.id, workflow.stage_ids[1], TaskSpec::new("two", "slow"))
        .await
        .unwrap();

    let execution_id = core
        .engine
        .start_workflow(workflow.id, json!({}))
        .await
        .unwrap();

    // Let the first stage get in flight, then stop
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(core.engine.stop_workflow(workflow.id).await.unwrap());
    assert_eq!(workflow_status(&store, workflow.id).await, WorkflowStatus::Paused);
    let execution = store.get_execution(execution_id).await.unwrap().unwrap();
    assert_eq!(execution.status, ExecutionStatus::Stopped);

    // Stopping again is an idempotent no-op
    assert!(!core.engine.stop_workflow(workflow.id).await.unwrap());

    // The in-flight stage runs to completion; the next stage never starts
    assert!(
        wait_until(2000, || async {
            store.get_task(first_task.id).await.unwrap().unwrap().status == TaskStatus::Done
        })
        .await
    );
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        store.get_task(second_task.id).await.unwrap().unwrap().status,
        TaskStatus::Todo
    );
    assert_eq!(workflow_status(&store, workflow.id).await, WorkflowStatus::Paused);

    // Restart picks up the remaining stage and completes the workflow
    core.engine
        .start_workflow(workflow.id, json!({}))
        .await
        .unwrap();
    assert!(
        wait_until(2000, || async {
            workflow_status(&store, workflow.id).await == WorkflowStatus::Completed
        })
        .await
    );
    assert_eq!(
        store.get_task(second_task.id).await.unwrap().unwrap().status,
        TaskStatus::Done
    );

    core.shutdown();
}

#[tokio::test]
async fn test_create_workflow_requires_name() {
    let (store, core) = test_core().await;

    let err = core
        .engine
        .create_workflow(WorkflowSpec {
            name: "   ".into(),
            description: String::new(),
            stages: vec![StageSpec::new("orphan")],
            roles: vec![],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));

    // Rejected before any state change: nothing was emitted
    assert!(store.all_events().await.is_empty());

    core.shutdown();
}

#[tokio::test]
async fn test_create_task_validations() {
    let (_store, core) = test_core().await;

    let workflow = core
        .engine
        .create_workflow(WorkflowSpec {
            name: "capped".into(),
            description: String::new(),
            stages: vec![StageSpec {
                name: "tight".into(),
                is_parallel: false,
                max_tasks: Some(1),
            }],
            roles: vec![],
        })
        .await
        .unwrap();
    let stage_id = workflow.stage_ids[0];

    // Unknown stage
    let err = core
        .engine
        .create_task(workflow.id, Uuid::new_v4(), TaskSpec::new("t", "noop"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));

    // Stage task cap
    core.engine
        .create_task(workflow.id, stage_id, TaskSpec::new("fits", "noop"))
        .await
        .unwrap();
    let err = core
        .engine
        .create_task(workflow.id, stage_id, TaskSpec::new("overflow", "noop"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));

    core.shutdown();
}

#[tokio::test]
async fn test_move_task_between_stages() {
    let (store, core) = test_core().await;

    let workflow = core
        .engine
        .create_workflow(two_stage_spec("backlog", "doing"))
        .await
        .unwrap();
    let task = core
        .engine
        .create_task(workflow.id, workflow.stage_ids[0], TaskSpec::new("card", "noop"))
        .await
        .unwrap();

    let moved = core
        .engine
        .move_task(task.id, workflow.stage_ids[1], 0)
        .await
        .unwrap();
    assert_eq!(moved.stage_id, workflow.stage_ids[1]);
    assert_eq!(moved.position, 0);

    assert!(
        wait_until(2000, || async {
            store
                .all_events()
                .await
                .iter()
                .any(|e| e.event_type == "task.moved" && e.status == EventStatus::Processed)
        })
        .await
    );

    core.shutdown();
}
