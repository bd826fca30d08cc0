//! # In-Memory Store
//!
//! Reference implementation of the [`PersistencePort`] backed by
//! `RwLock<HashMap>` tables, one per record type. Used by the test suite
//! and by hosts embedding the core without a durable store.

use super::PersistencePort;
use crate::error::Result;
use crate::models::{
    Event, EventHandlerRecord, EventRule, EventSubscriptionRecord, Execution, Role, Stage, Task,
    Workflow,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory keyed store with last-write-wins upserts
#[derive(Debug, Default)]
pub struct InMemoryStore {
    workflows: RwLock<HashMap<Uuid, Workflow>>,
    stages: RwLock<HashMap<Uuid, Stage>>,
    roles: RwLock<HashMap<Uuid, Role>>,
    tasks: RwLock<HashMap<Uuid, Task>>,
    events: RwLock<HashMap<Uuid, Event>>,
    rules: RwLock<HashMap<Uuid, EventRule>>,
    executions: RwLock<HashMap<Uuid, Execution>>,
    subscriptions: RwLock<Vec<EventSubscriptionRecord>>,
    handler_records: RwLock<Vec<EventHandlerRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handler invocation records persisted (test observability)
    pub async fn handler_record_count(&self) -> usize {
        self.handler_records.read().await.len()
    }

    /// Handler records captured for one event (test observability)
    pub async fn handler_records_for(&self, event_id: Uuid) -> Vec<EventHandlerRecord> {
        self.handler_records
            .read()
            .await
            .iter()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect()
    }

    /// All persisted events (test observability)
    pub async fn all_events(&self) -> Vec<Event> {
        self.events.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl PersistencePort for InMemoryStore {
    async fn save_workflow(&self, workflow: &Workflow) -> Result<()> {
        self.workflows
            .write()
            .await
            .insert(workflow.id, workflow.clone());
        Ok(())
    }

    async fn get_workflow(&self, id: Uuid) -> Result<Option<Workflow>> {
        Ok(self.workflows.read().await.get(&id).cloned())
    }

    async fn update_workflow(&self, workflow: &Workflow) -> Result<()> {
        self.save_workflow(workflow).await
    }

    async fn save_stage(&self, stage: &Stage) -> Result<()> {
        self.stages.write().await.insert(stage.id, stage.clone());
        Ok(())
    }

    async fn get_stage(&self, id: Uuid) -> Result<Option<Stage>> {
        Ok(self.stages.read().await.get(&id).cloned())
    }

    async fn list_stages(&self, workflow_id: Uuid) -> Result<Vec<Stage>> {
        let mut stages: Vec<Stage> = self
            .stages
            .read()
            .await
            .values()
            .filter(|s| s.workflow_id == workflow_id)
            .cloned()
            .collect();
        stages.sort_by_key(|s| s.order_index);
        Ok(stages)
    }

    async fn save_role(&self, role: &Role) -> Result<()> {
        self.roles.write().await.insert(role.id, role.clone());
        Ok(())
    }

    async fn list_roles(&self, workflow_id: Uuid) -> Result<Vec<Role>> {
        Ok(self
            .roles
            .read()
            .await
            .values()
            .filter(|r| r.workflow_id == workflow_id)
            .cloned()
            .collect())
    }

    async fn save_task(&self, task: &Task) -> Result<()> {
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn update_task(&self, task: &Task) -> Result<()> {
        self.save_task(task).await
    }

    async fn list_tasks(&self, stage_id: Uuid) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.stage_id == stage_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.position);
        Ok(tasks)
    }

    async fn save_event(&self, event: &Event) -> Result<()> {
        self.events.write().await.insert(event.id, event.clone());
        Ok(())
    }

    async fn get_event(&self, id: Uuid) -> Result<Option<Event>> {
        Ok(self.events.read().await.get(&id).cloned())
    }

    async fn update_event(&self, event: &Event) -> Result<()> {
        self.save_event(event).await
    }

    async fn list_failed_events_retriable(&self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        Ok(self
            .events
            .read()
            .await
            .values()
            .filter(|e| e.is_retriable_at(now))
            .cloned()
            .collect())
    }

    async fn save_event_rule(&self, rule: &EventRule) -> Result<()> {
        self.rules.write().await.insert(rule.id, rule.clone());
        Ok(())
    }

    async fn get_event_rule(&self, id: Uuid) -> Result<Option<EventRule>> {
        Ok(self.rules.read().await.get(&id).cloned())
    }

    async fn update_event_rule(&self, rule: &EventRule) -> Result<()> {
        self.save_event_rule(rule).await
    }

    async fn list_active_event_rules(&self) -> Result<Vec<EventRule>> {
        let mut rules: Vec<EventRule> = self
            .rules
            .read()
            .await
            .values()
            .filter(|r| r.active)
            .cloned()
            .collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(rules)
    }

    async fn save_execution(&self, execution: &Execution) -> Result<()> {
        self.executions
            .write()
            .await
            .insert(execution.id, execution.clone());
        Ok(())
    }

    async fn get_execution(&self, id: Uuid) -> Result<Option<Execution>> {
        Ok(self.executions.read().await.get(&id).cloned())
    }

    async fn update_execution(&self, execution: &Execution) -> Result<()> {
        self.save_execution(execution).await
    }

    async fn save_subscription(&self, record: &EventSubscriptionRecord) -> Result<()> {
        self.subscriptions.write().await.push(record.clone());
        Ok(())
    }

    async fn save_handler_record(&self, record: &EventHandlerRecord) -> Result<()> {
        self.handler_records.write().await.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventSpec, StageSpec, TaskSpec};
    use chrono::Duration;

    #[tokio::test]
    async fn test_workflow_upsert_last_write_wins() {
        let store = InMemoryStore::new();
        let mut workflow = Workflow::new("pipeline", "");
        store.save_workflow(&workflow).await.unwrap();

        workflow.execution_count = 5;
        store.update_workflow(&workflow).await.unwrap();

        let loaded = store.get_workflow(workflow.id).await.unwrap().unwrap();
        assert_eq!(loaded.execution_count, 5);
    }

    #[tokio::test]
    async fn test_list_stages_ordered_by_order_index() {
        let store = InMemoryStore::new();
        let workflow = Workflow::new("pipeline", "");
        // Insert out of order on purpose
        for index in [2u32, 0, 1] {
            let stage = Stage::new(
                workflow.id,
                &StageSpec::new(format!("stage-{index}")),
                index,
                50,
            );
            store.save_stage(&stage).await.unwrap();
        }

        let stages = store.list_stages(workflow.id).await.unwrap();
        let indexes: Vec<u32> = stages.iter().map(|s| s.order_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_list_tasks_ordered_by_position() {
        let store = InMemoryStore::new();
        let workflow_id = Uuid::new_v4();
        let stage_id = Uuid::new_v4();
        for position in [1u32, 0, 2] {
            let task = Task::new(
                workflow_id,
                stage_id,
                TaskSpec::new(format!("task-{position}"), "noop"),
                position,
                3,
            );
            store.save_task(&task).await.unwrap();
        }

        let tasks = store.list_tasks(stage_id).await.unwrap();
        let positions: Vec<u32> = tasks.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_retriable_event_scan() {
        let store = InMemoryStore::new();
        let now = Utc::now();

        let mut due = Event::new(EventSpec::new("task.failed"), 3);
        due.status = crate::models::EventStatus::Failed;
        due.retry_count = 1;
        due.next_retry_at = Some(now - Duration::seconds(5));
        store.save_event(&due).await.unwrap();

        let mut exhausted = Event::new(EventSpec::new("task.failed"), 3);
        exhausted.status = crate::models::EventStatus::Failed;
        exhausted.retry_count = 3;
        exhausted.next_retry_at = Some(now - Duration::seconds(5));
        store.save_event(&exhausted).await.unwrap();

        let retriable = store.list_failed_events_retriable(now).await.unwrap();
        assert_eq!(retriable.len(), 1);
        assert_eq!(retriable[0].id, due.id);
    }

    #[tokio::test]
    async fn test_active_rules_priority_descending() {
        let store = InMemoryStore::new();
        for (name, priority, active) in
            [("low", 1, true), ("high", 10, true), ("off", 99, false)]
        {
            let mut rule = EventRule::new(name, "task.completed").with_priority(priority);
            rule.active = active;
            store.save_event_rule(&rule).await.unwrap();
        }

        let rules = store.list_active_event_rules().await.unwrap();
        let names: Vec<&str> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["high", "low"]);
    }
}
