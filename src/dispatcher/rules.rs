//! # Rule Evaluation
//!
//! Condition matching and action dispatch for event rules. The rule
//! engine checks the event-type filter, then every field-level predicate
//! (logical AND) against the event's payload and context, and on a match
//! invokes the rule's named actions through the action handler registry.
//!
//! Fields are resolved against the payload first, then the context.
//! `greater_than`/`less_than` coerce both operands to numbers and treat
//! an uncoercible or missing operand as "condition not met".

use crate::models::{ConditionOperator, Event, EventRule, TriggerCondition};
use crate::registry::ActionHandlerRegistry;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of evaluating one rule against one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    /// Type filter or a condition did not match
    NotMatched,
    /// Rule fired and every action succeeded
    Fired,
    /// Rule fired but at least one action failed
    FiredWithFailures { failed_actions: Vec<String> },
}

/// Evaluates rules and dispatches their actions
pub struct RuleEngine {
    actions: Arc<ActionHandlerRegistry>,
}

impl RuleEngine {
    pub fn new(actions: Arc<ActionHandlerRegistry>) -> Self {
        Self { actions }
    }

    /// Evaluate one rule against an event, invoking actions on a match
    pub async fn evaluate(&self, rule: &EventRule, event: &Event) -> RuleOutcome {
        if !rule_matches(rule, event) {
            return RuleOutcome::NotMatched;
        }

        debug!(
            rule = %rule.name,
            event_id = %event.id,
            event_type = %event.event_type,
            "Rule matched, dispatching actions"
        );

        let mut failed_actions = Vec::new();
        for action in &rule.actions {
            match self.actions.resolve(&action.action) {
                Some(handler) => {
                    if let Err(error) = handler.execute(event, &action.config).await {
                        warn!(
                            rule = %rule.name,
                            action = %action.action,
                            error = %error,
                            "Rule action failed"
                        );
                        failed_actions.push(action.action.clone());
                    }
                }
                None => {
                    // Unregistered action names are safe no-ops
                    warn!(
                        rule = %rule.name,
                        action = %action.action,
                        "No handler registered for rule action; skipping"
                    );
                }
            }
        }

        if failed_actions.is_empty() {
            RuleOutcome::Fired
        } else {
            RuleOutcome::FiredWithFailures { failed_actions }
        }
    }
}

/// Check the event-type filter and every trigger condition
pub fn rule_matches(rule: &EventRule, event: &Event) -> bool {
    if rule.event_type != event.event_type {
        return false;
    }
    rule.conditions
        .iter()
        .all(|condition| condition_met(condition, event))
}

fn condition_met(condition: &TriggerCondition, event: &Event) -> bool {
    let actual = lookup_field(event, &condition.field);

    match condition.operator {
        ConditionOperator::Exists => actual.is_some(),
        ConditionOperator::NotExists => actual.is_none(),
        ConditionOperator::Equals => actual == Some(&condition.value),
        ConditionOperator::NotEquals => actual != Some(&condition.value),
        ConditionOperator::Contains => actual
            .map(|value| value_contains(value, &condition.value))
            .unwrap_or(false),
        ConditionOperator::GreaterThan => compare_numeric(actual, &condition.value)
            .map(|(lhs, rhs)| lhs > rhs)
            .unwrap_or(false),
        ConditionOperator::LessThan => compare_numeric(actual, &condition.value)
            .map(|(lhs, rhs)| lhs < rhs)
            .unwrap_or(false),
    }
}

/// Resolve a condition field: payload first, then context. `Null` counts
/// as absent.
fn lookup_field<'a>(event: &'a Event, field: &str) -> Option<&'a Value> {
    event
        .payload
        .get(field)
        .or_else(|| event.context.get(field))
        .filter(|value| !value.is_null())
}

fn value_contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::String(s) => needle.as_str().map(|n| s.contains(n)).unwrap_or(false),
        Value::Array(items) => items.contains(needle),
        Value::Object(map) => needle.as_str().map(|n| map.contains_key(n)).unwrap_or(false),
        _ => false,
    }
}

fn compare_numeric(actual: Option<&Value>, expected: &Value) -> Option<(f64, f64)> {
    Some((coerce_number(actual?)?, coerce_number(expected)?))
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
