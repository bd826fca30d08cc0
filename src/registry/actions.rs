//! # Action Handler Registry
//!
//! Maps rule action names to their handlers. The rule engine's job is
//! strictly condition matching and dispatch; the handlers implement the
//! actions. The five built-in action names are pre-registered as safe
//! no-ops so a rule referencing an unconfigured action never fails the
//! event, and hosts override them by re-registering.

use crate::constants::actions as action_names;
use crate::models::Event;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// A callable invoked when a fired rule names this action
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn execute(&self, event: &Event, config: &Value) -> anyhow::Result<()>;

    /// Handler name for logging
    fn handler_name(&self) -> &str {
        "unnamed_action"
    }
}

/// Safe default for built-in action names with no concrete behavior wired
struct NoopAction {
    action: String,
}

#[async_trait]
impl ActionHandler for NoopAction {
    async fn execute(&self, event: &Event, _config: &Value) -> anyhow::Result<()> {
        debug!(
            action = %self.action,
            event_id = %event.id,
            event_type = %event.event_type,
            "Action has no concrete handler configured; no-op"
        );
        Ok(())
    }

    fn handler_name(&self) -> &str {
        "noop"
    }
}

/// Registry mapping action names to handlers
#[derive(Default)]
pub struct ActionHandlerRegistry {
    handlers: DashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the five built-in actions pre-registered as no-ops
    pub fn with_builtin_actions() -> Self {
        let registry = Self::new();
        for action in action_names::BUILTIN_ACTIONS {
            registry.handlers.insert(
                (*action).to_string(),
                Arc::new(NoopAction {
                    action: (*action).to_string(),
                }),
            );
        }
        registry
    }

    /// Register a handler for an action name, replacing any existing one
    pub fn register(&self, action: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        let action = action.into();
        info!(
            action = %action,
            handler = handler.handler_name(),
            "Registered action handler"
        );
        self.handlers.insert(action, handler);
    }

    /// Resolve the handler for an action name
    pub fn resolve(&self, action: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(action).map(|e| e.value().clone())
    }

    /// Action names with a registered handler
    pub fn registered_actions(&self) -> Vec<String> {
        self.handlers.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for ActionHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionHandlerRegistry")
            .field("registered_actions", &self.registered_actions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventSpec;
    use serde_json::json;

    #[tokio::test]
    async fn test_builtin_actions_are_noops() {
        let registry = ActionHandlerRegistry::with_builtin_actions();
        assert_eq!(registry.len(), 5);

        let event = Event::new(EventSpec::new("task.completed"), 3);
        let handler = registry.resolve(action_names::SEND_WEBHOOK).unwrap();
        handler.execute(&event, &json!({})).await.unwrap();
    }

    #[tokio::test]
    async fn test_register_overrides_builtin() {
        struct CountingAction(std::sync::atomic::AtomicU32);

        #[async_trait]
        impl ActionHandler for CountingAction {
            async fn execute(&self, _event: &Event, _config: &Value) -> anyhow::Result<()> {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            }

            fn handler_name(&self) -> &str {
                "counting"
            }
        }

        let registry = ActionHandlerRegistry::with_builtin_actions();
        let counting = Arc::new(CountingAction(std::sync::atomic::AtomicU32::new(0)));
        registry.register(action_names::CREATE_TASK, counting.clone());

        let event = Event::new(EventSpec::new("task.completed"), 3);
        let handler = registry.resolve(action_names::CREATE_TASK).unwrap();
        handler.execute(&event, &Value::Null).await.unwrap();
        assert_eq!(counting.0.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_action_resolves_none() {
        let registry = ActionHandlerRegistry::with_builtin_actions();
        assert!(registry.resolve("launch_missiles").is_none());
    }
}
