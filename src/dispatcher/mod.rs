//! # Event Dispatcher
//!
//! The pub/sub bus at the center of the control plane. Accepts events,
//! persists them, queues them, fans them out to subscribed handlers,
//! applies automation rules, and manages retry with capped exponential
//! backoff.
//!
//! ## Architecture
//!
//! - **dispatch** persists an event in Pending and pushes a queue entry;
//!   the caller never blocks on delivery.
//! - **delivery loop**: a single consumer pops entries FIFO and spawns a
//!   concurrent handling unit per event, so a slow event never blocks the
//!   head of the queue. The entry carries the event's priority tag, but
//!   delivery order stays plain FIFO; priority is advisory metadata.
//! - **handling unit**: loads the event, flips it to Processing, evaluates
//!   the active rules, fans out to every subscribed handler concurrently,
//!   and aggregates outcomes. Handler failures are isolated per handler;
//!   only an error raised before fan-out fails the event.
//! - **retry loop**: periodically rescans failed events whose
//!   `next_retry_at` is due and re-enqueues them, once per scan. Events
//!   that exhaust their retry budget stay Failed for manual inspection.

pub mod rules;

pub use rules::{rule_matches, RuleEngine, RuleOutcome};

use crate::config::DispatcherConfig;
use crate::error::{CoreError, Result};
use crate::models::{
    Event, EventHandlerRecord, EventPriority, EventRule, EventSpec, EventStatus,
    EventSubscriptionRecord,
};
use crate::registry::ActionHandlerRegistry;
use crate::storage::PersistencePort;
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A subscriber callback invoked for every event of a subscribed type
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one event; the returned value is recorded for observability
    async fn handle_event(&self, event: &Event) -> anyhow::Result<Value>;

    /// Handler name for subscription and invocation records
    fn handler_name(&self) -> &str {
        "unnamed_handler"
    }
}

/// One registered subscription for an event type
#[derive(Clone)]
struct SubscriberEntry {
    handler: Arc<dyn EventHandler>,
    #[allow(dead_code)]
    config: Value,
}

/// What travels through the delivery queue
#[derive(Debug, Clone)]
struct QueueEntry {
    event_id: Uuid,
    event_type: String,
    priority: EventPriority,
}

#[derive(Debug, Default)]
struct DispatcherCounters {
    dispatched: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
}

/// Snapshot of dispatcher activity
#[derive(Debug, Clone)]
pub struct DispatcherStats {
    pub events_dispatched: u64,
    pub events_processed: u64,
    pub events_failed: u64,
    pub events_retried: u64,
    pub subscriber_count: usize,
    pub rule_count: usize,
}

/// The pub/sub bus: cheaply cloneable handle over shared state
#[derive(Clone)]
pub struct EventDispatcher {
    store: Arc<dyn PersistencePort>,
    actions: Arc<ActionHandlerRegistry>,
    rule_engine: Arc<RuleEngine>,
    config: DispatcherConfig,
    subscribers: Arc<RwLock<HashMap<String, Vec<SubscriberEntry>>>>,
    rule_cache: Arc<parking_lot::RwLock<Vec<EventRule>>>,
    queue_tx: mpsc::UnboundedSender<QueueEntry>,
    queue_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<QueueEntry>>>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    counters: Arc<DispatcherCounters>,
}

impl EventDispatcher {
    /// Create a dispatcher over a persistence port and action registry
    ///
    /// The delivery and retry loops do not run until [`start`] is called;
    /// events dispatched before that accumulate in the queue.
    ///
    /// [`start`]: EventDispatcher::start
    pub fn new(
        store: Arc<dyn PersistencePort>,
        actions: Arc<ActionHandlerRegistry>,
        config: DispatcherConfig,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            store,
            rule_engine: Arc::new(RuleEngine::new(actions.clone())),
            actions,
            config,
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            rule_cache: Arc::new(parking_lot::RwLock::new(Vec::new())),
            queue_tx,
            queue_rx: Arc::new(Mutex::new(Some(queue_rx))),
            shutdown_tx: Arc::new(shutdown_tx),
            counters: Arc::new(DispatcherCounters::default()),
        }
    }

    /// Load the rule cache and spawn the delivery and retry loops
    ///
    /// Idempotent: a second call logs a warning and does nothing.
    pub async fn start(&self) -> Result<()> {
        let rx = {
            let mut slot = self.queue_rx.lock().await;
            match slot.take() {
                Some(rx) => rx,
                None => {
                    warn!("Event dispatcher already started");
                    return Ok(());
                }
            }
        };

        self.refresh_rule_cache().await?;

        let dispatcher = self.clone();
        let shutdown = self.shutdown_tx.subscribe();
        tokio::spawn(async move { dispatcher.delivery_loop(rx, shutdown).await });

        let dispatcher = self.clone();
        let shutdown = self.shutdown_tx.subscribe();
        tokio::spawn(async move { dispatcher.retry_loop(shutdown).await });

        info!(
            rules = self.rule_cache.read().len(),
            "Event dispatcher started"
        );
        Ok(())
    }

    /// Signal the delivery and retry loops to stop
    pub fn shutdown(&self) {
        info!("Event dispatcher shutting down");
        let _ = self.shutdown_tx.send(true);
    }

    /// Persist and enqueue an event; returns its id without waiting for
    /// delivery
    pub async fn dispatch(&self, spec: EventSpec) -> Result<Uuid> {
        let event = Event::new(spec, self.config.default_max_retries);
        self.store.save_event(&event).await?;

        let entry = QueueEntry {
            event_id: event.id,
            event_type: event.event_type.clone(),
            priority: event.priority,
        };
        self.queue_tx
            .send(entry)
            .map_err(|_| CoreError::dispatch_failure("delivery queue is closed"))?;

        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
        debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            priority = ?event.priority,
            "Event dispatched"
        );
        Ok(event.id)
    }

    /// Register a handler for an event type and record the subscription
    pub async fn subscribe(
        &self,
        event_type: &str,
        handler: Arc<dyn EventHandler>,
        config: Value,
    ) -> Result<()> {
        let record = EventSubscriptionRecord::new(event_type, handler.handler_name(), config.clone());
        self.store.save_subscription(&record).await?;

        self.subscribers
            .write()
            .await
            .entry(event_type.to_string())
            .or_default()
            .push(SubscriberEntry { handler: handler.clone(), config });

        info!(
            event_type = %event_type,
            handler = handler.handler_name(),
            "Subscribed handler"
        );
        Ok(())
    }

    /// Remove a handler from an event type; returns whether one was found
    pub async fn unsubscribe(&self, event_type: &str, handler_name: &str) -> bool {
        let mut subscribers = self.subscribers.write().await;
        let Some(entries) = subscribers.get_mut(event_type) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| entry.handler.handler_name() != handler_name);
        let removed = before != entries.len();
        if removed {
            info!(event_type = %event_type, handler = %handler_name, "Unsubscribed handler");
        }
        removed
    }

    /// Persist a new rule and refresh the cache
    pub async fn register_rule(&self, rule: EventRule) -> Result<Uuid> {
        let rule_id = rule.id;
        self.store.save_event_rule(&rule).await?;
        self.refresh_rule_cache().await?;
        info!(rule = %rule.name, event_type = %rule.event_type, "Registered event rule");
        Ok(rule_id)
    }

    /// Persist a rule update and refresh the cache
    pub async fn update_rule(&self, rule: EventRule) -> Result<()> {
        self.store.update_event_rule(&rule).await?;
        self.refresh_rule_cache().await?;
        Ok(())
    }

    /// Reload active rules from the port, priority descending
    pub async fn refresh_rule_cache(&self) -> Result<()> {
        let rules = self.store.list_active_event_rules().await?;
        *self.rule_cache.write() = rules;
        Ok(())
    }

    /// Registry rule actions dispatch through; hosts register concrete
    /// handlers here
    pub fn action_registry(&self) -> &Arc<ActionHandlerRegistry> {
        &self.actions
    }

    /// Snapshot of dispatcher activity
    pub async fn stats(&self) -> DispatcherStats {
        let subscriber_count = self.subscribers.read().await.values().map(Vec::len).sum();
        DispatcherStats {
            events_dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            events_processed: self.counters.processed.load(Ordering::Relaxed),
            events_failed: self.counters.failed.load(Ordering::Relaxed),
            events_retried: self.counters.retried.load(Ordering::Relaxed),
            subscriber_count,
            rule_count: self.rule_cache.read().len(),
        }
    }

    async fn delivery_loop(
        &self,
        mut rx: mpsc::UnboundedReceiver<QueueEntry>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                entry = rx.recv() => match entry {
                    Some(entry) => {
                        debug!(
                            event_id = %entry.event_id,
                            event_type = %entry.event_type,
                            priority = ?entry.priority,
                            "Dequeued event"
                        );
                        let dispatcher = self.clone();
                        tokio::spawn(async move {
                            dispatcher.process_event(entry.event_id).await;
                        });
                    }
                    None => break,
                }
            }
        }
        debug!("Delivery loop stopped");
    }

    async fn retry_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.retry_scan_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(error) = self.scan_failed_events().await {
                        warn!(error = %error, "Retry scan failed");
                    }
                }
            }
        }
        debug!("Retry loop stopped");
    }

    /// Reset due failed events to Pending and re-enqueue them, once each
    async fn scan_failed_events(&self) -> Result<()> {
        let now = Utc::now();
        let due = self.store.list_failed_events_retriable(now).await?;
        for mut event in due {
            event.status = EventStatus::Pending;
            event.next_retry_at = None;
            event.updated_at = Utc::now();
            self.store.update_event(&event).await?;

            let entry = QueueEntry {
                event_id: event.id,
                event_type: event.event_type.clone(),
                priority: event.priority,
            };
            if self.queue_tx.send(entry).is_err() {
                warn!(event_id = %event.id, "Delivery queue closed during retry re-enqueue");
                break;
            }
            self.counters.retried.fetch_add(1, Ordering::Relaxed);
            info!(
                event_id = %event.id,
                retry_count = event.retry_count,
                "Re-enqueued failed event for retry"
            );
        }
        Ok(())
    }

    /// One handling unit: rules, fan-out, outcome aggregation
    async fn process_event(&self, event_id: Uuid) {
        let started = Instant::now();
        let mut event = match self.store.get_event(event_id).await {
            Ok(Some(event)) => event,
            Ok(None) => {
                error!(event_id = %event_id, "Dequeued event not found in store");
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Err(error) => {
                error!(event_id = %event_id, error = %error, "Failed to load dequeued event");
                return;
            }
        };

        match self.handle_event(&mut event, started).await {
            Ok(handler_count) => {
                self.counters.processed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    handlers = handler_count,
                    duration_ms = event.processing_duration_ms,
                    "Event processed"
                );
            }
            Err(error) => self.fail_event(&mut event, &error).await,
        }
    }

    async fn handle_event(&self, event: &mut Event, started: Instant) -> Result<usize> {
        event.status = EventStatus::Processing;
        event.updated_at = Utc::now();
        self.store.update_event(event).await?;

        self.apply_rules(event).await?;

        let entries: Vec<SubscriberEntry> = self
            .subscribers
            .read()
            .await
            .get(&event.event_type)
            .cloned()
            .unwrap_or_default();

        // Handler failures are isolated: recorded per handler, never
        // failing the event as a whole
        let snapshot = event.clone();
        let outcomes = join_all(
            entries
                .iter()
                .map(|entry| self.invoke_handler(entry, &snapshot)),
        )
        .await;
        let failures = outcomes.iter().filter(|ok| !**ok).count();
        if failures > 0 {
            warn!(
                event_id = %event.id,
                failures,
                handlers = entries.len(),
                "Event processed with isolated handler failures"
            );
        }

        event.status = EventStatus::Processed;
        event.processing_duration_ms = Some(started.elapsed().as_millis() as i64);
        event.updated_at = Utc::now();
        self.store.update_event(event).await?;
        Ok(entries.len())
    }

    /// Invoke one handler and persist its invocation record
    async fn invoke_handler(&self, entry: &SubscriberEntry, event: &Event) -> bool {
        let handler_started = Instant::now();
        let result = entry.handler.handle_event(event).await;
        let success = result.is_ok();

        let record = EventHandlerRecord {
            id: Uuid::new_v4(),
            event_id: event.id,
            handler_name: entry.handler.handler_name().to_string(),
            success,
            error: result.as_ref().err().map(|e| e.to_string()),
            duration_ms: handler_started.elapsed().as_millis() as i64,
            executed_at: Utc::now(),
        };
        if let Err(error) = self.store.save_handler_record(&record).await {
            warn!(event_id = %event.id, error = %error, "Failed to persist handler record");
        }

        if let Err(error) = &result {
            let wrapped = CoreError::handler(
                entry.handler.handler_name(),
                event.id,
                error.to_string(),
            );
            warn!(error = %wrapped, "Handler failed; isolated");
        }
        success
    }

    /// Evaluate cached rules in priority order against the event
    async fn apply_rules(&self, event: &Event) -> Result<()> {
        let rules: Vec<EventRule> = self.rule_cache.read().clone();
        for mut rule in rules {
            let outcome = self.rule_engine.evaluate(&rule, event).await;
            if outcome == RuleOutcome::NotMatched {
                continue;
            }

            rule.execution_count += 1;
            match &outcome {
                RuleOutcome::Fired => rule.success_count += 1,
                RuleOutcome::FiredWithFailures { failed_actions } => {
                    rule.failure_count += 1;
                    warn!(
                        rule = %rule.name,
                        event_id = %event.id,
                        ?failed_actions,
                        "Rule fired with action failures"
                    );
                }
                RuleOutcome::NotMatched => unreachable!(),
            }
            rule.updated_at = Utc::now();
            self.store.update_event_rule(&rule).await?;
            self.replace_cached_rule(rule);
        }
        Ok(())
    }

    fn replace_cached_rule(&self, rule: EventRule) {
        let mut cache = self.rule_cache.write();
        if let Some(slot) = cache.iter_mut().find(|r| r.id == rule.id) {
            *slot = rule;
        }
    }

    /// Record a pre-fan-out failure and schedule a retry if budget remains
    async fn fail_event(&self, event: &mut Event, error: &CoreError) {
        event.status = EventStatus::Failed;
        event.error = Some(error.to_string());
        event.retry_count += 1;
        event.next_retry_at = if event.retry_count < event.max_retries {
            Some(Utc::now() + retry_backoff(&self.config, event.retry_count))
        } else {
            None
        };
        event.updated_at = Utc::now();

        if let Err(persist_error) = self.store.update_event(event).await {
            error!(
                event_id = %event.id,
                error = %persist_error,
                "Failed to persist event failure"
            );
        }
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        warn!(
            event_id = %event.id,
            event_type = %event.event_type,
            retry_count = event.retry_count,
            max_retries = event.max_retries,
            next_retry_at = ?event.next_retry_at,
            error = %error,
            "Event processing failed"
        );
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("config", &self.config)
            .finish()
    }
}

/// Capped exponential backoff: `min(backoff_max, backoff_base * 2^retries)`
fn retry_backoff(config: &DispatcherConfig, retry_count: u32) -> chrono::Duration {
    let exponential =
        config.backoff_base.as_secs_f64() * 2f64.powi(retry_count.min(30) as i32);
    let capped = exponential.min(config.backoff_max.as_secs_f64());
    chrono::Duration::milliseconds((capped * 1000.0) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_then_caps() {
        let config = DispatcherConfig::default();
        assert_eq!(retry_backoff(&config, 1).num_seconds(), 60);
        assert_eq!(retry_backoff(&config, 2).num_seconds(), 120);
        assert_eq!(retry_backoff(&config, 3).num_seconds(), 240);
        assert_eq!(retry_backoff(&config, 4).num_seconds(), 300);
        assert_eq!(retry_backoff(&config, 20).num_seconds(), 300);
    }

    #[test]
    fn test_backoff_respects_custom_base() {
        let config = DispatcherConfig {
            backoff_base: std::time::Duration::from_millis(10),
            backoff_max: std::time::Duration::from_millis(25),
            ..DispatcherConfig::default()
        };
        assert_eq!(retry_backoff(&config, 1).num_milliseconds(), 20);
        assert_eq!(retry_backoff(&config, 2).num_milliseconds(), 25);
    }
}
