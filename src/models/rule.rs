//! # Event Rule Model
//!
//! A condition → action automation evaluated against incoming events.
//! Rules are persisted, loaded into the dispatcher's cache at start, and
//! kept in sync on create/update. Evaluation itself lives in
//! `dispatcher::rules`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Comparison operators available to rule conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    Exists,
    NotExists,
}

/// One field-level predicate over an event's payload or context
///
/// The field is resolved against the payload first, then the context.
/// All conditions in a rule must pass (logical AND) for the rule to fire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerCondition {
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: Value,
}

impl TriggerCondition {
    pub fn new(field: impl Into<String>, operator: ConditionOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }
}

/// One named action a fired rule invokes through the action handler registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleAction {
    /// Action name, e.g. `create_task` or `send_webhook`
    pub action: String,
    /// Handler-specific configuration passed through verbatim
    #[serde(default)]
    pub config: Value,
}

impl RuleAction {
    pub fn new(action: impl Into<String>, config: Value) -> Self {
        Self {
            action: action.into(),
            config,
        }
    }
}

/// A condition → action automation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRule {
    pub id: Uuid,
    pub name: String,
    /// Event type this rule applies to
    pub event_type: String,
    pub conditions: Vec<TriggerCondition>,
    /// Actions invoked in order when the rule fires
    pub actions: Vec<RuleAction>,
    /// Evaluation order: higher priority rules are checked first
    pub priority: i32,
    pub active: bool,
    pub execution_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventRule {
    pub fn new(name: impl Into<String>, event_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            event_type: event_type.into(),
            conditions: Vec::new(),
            actions: Vec::new(),
            priority: 0,
            active: true,
            execution_count: 0,
            success_count: 0,
            failure_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_condition(mut self, condition: TriggerCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_action(mut self, action: RuleAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_builder() {
        let rule = EventRule::new("escalate-failures", "task.failed")
            .with_condition(TriggerCondition::new(
                "severity",
                ConditionOperator::Equals,
                json!("high"),
            ))
            .with_action(RuleAction::new("send_notification", json!({"channel": "ops"})))
            .with_priority(10);

        assert_eq!(rule.event_type, "task.failed");
        assert_eq!(rule.conditions.len(), 1);
        assert_eq!(rule.actions.len(), 1);
        assert_eq!(rule.priority, 10);
        assert!(rule.active);
    }

    #[test]
    fn test_operator_serde_names() {
        let json = serde_json::to_string(&ConditionOperator::GreaterThan).unwrap();
        assert_eq!(json, "\"greater_than\"");
        let op: ConditionOperator = serde_json::from_str("\"not_exists\"").unwrap();
        assert_eq!(op, ConditionOperator::NotExists);
    }
}
