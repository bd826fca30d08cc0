//! Test doubles: recording/failing handlers and scripted executors.

use async_trait::async_trait;
use cadence_core::dispatcher::EventHandler;
use cadence_core::models::{Event, Task};
use cadence_core::registry::TaskExecutor;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Subscriber that records every event it sees
pub struct RecordingHandler {
    name: String,
    seen: Arc<Mutex<Vec<Event>>>,
}

impl RecordingHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn seen(&self) -> Arc<Mutex<Vec<Event>>> {
        self.seen.clone()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle_event(&self, event: &Event) -> anyhow::Result<Value> {
        self.seen.lock().unwrap().push(event.clone());
        Ok(json!({ "recorded": true }))
    }

    fn handler_name(&self) -> &str {
        &self.name
    }
}

/// Subscriber that always fails
pub struct FailingHandler;

#[async_trait]
impl EventHandler for FailingHandler {
    async fn handle_event(&self, _event: &Event) -> anyhow::Result<Value> {
        anyhow::bail!("handler exploded")
    }

    fn handler_name(&self) -> &str {
        "failing_handler"
    }
}

/// Executor that records task titles in invocation order, with an
/// optional artificial delay
pub struct OrderTrackingExecutor {
    log: Arc<Mutex<Vec<String>>>,
    delay: Duration,
}

impl OrderTrackingExecutor {
    pub fn new(log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            log,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(log: Arc<Mutex<Vec<String>>>, delay: Duration) -> Self {
        Self { log, delay }
    }
}

#[async_trait]
impl TaskExecutor for OrderTrackingExecutor {
    async fn execute(&self, task: &Task, _context: &Value) -> anyhow::Result<Value> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.log.lock().unwrap().push(task.title.clone());
        Ok(json!({ "done": task.title }))
    }

    fn executor_name(&self) -> &str {
        "order_tracking"
    }
}

/// Executor that fails tasks with a matching title and succeeds otherwise
pub struct FailOnTitleExecutor {
    fail_title: String,
    error: String,
    success_delay: Duration,
}

impl FailOnTitleExecutor {
    pub fn new(fail_title: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            fail_title: fail_title.into(),
            error: error.into(),
            success_delay: Duration::ZERO,
        }
    }

    /// Delay successful tasks, letting a failure abort the stage while
    /// siblings are still running
    pub fn with_success_delay(mut self, delay: Duration) -> Self {
        self.success_delay = delay;
        self
    }
}

#[async_trait]
impl TaskExecutor for FailOnTitleExecutor {
    async fn execute(&self, task: &Task, _context: &Value) -> anyhow::Result<Value> {
        if task.title == self.fail_title {
            anyhow::bail!(self.error.clone());
        }
        if !self.success_delay.is_zero() {
            tokio::time::sleep(self.success_delay).await;
        }
        Ok(json!({ "done": task.title }))
    }

    fn executor_name(&self) -> &str {
        "fail_on_title"
    }
}
