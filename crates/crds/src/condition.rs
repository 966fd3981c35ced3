//! Status conditions
//!
//! Timestamped markers stored on `Repository.status.conditions`. The catalog
//! watcher stamps `Ready` and `Synced` at the end of every poll cycle.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type for repository readiness
pub const CONDITION_READY: &str = "Ready";

/// Condition type for the last catalog sync attempt
pub const CONDITION_SYNCED: &str = "Synced";

/// Condition status, following the Kubernetes convention
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub enum ConditionStatus {
    /// Condition holds
    True,

    /// Condition does not hold
    False,

    /// Not yet determined
    #[default]
    Unknown,
}

/// A single status condition
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type ("Ready", "Synced")
    #[serde(rename = "type")]
    pub type_: String,

    /// Condition status
    pub status: ConditionStatus,

    /// Machine readable reason
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    /// Human readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// When the condition was last written
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Repository is reachable and its watcher is running
    pub fn ready(now: DateTime<Utc>) -> Self {
        Self {
            type_: CONDITION_READY.to_string(),
            status: ConditionStatus::True,
            reason: "Available".to_string(),
            message: None,
            last_transition_time: now,
        }
    }

    /// The catalog was polled at `now`
    pub fn synced(now: DateTime<Utc>) -> Self {
        Self {
            type_: CONDITION_SYNCED.to_string(),
            status: ConditionStatus::True,
            reason: "ReconcileSuccess".to_string(),
            message: None,
            last_transition_time: now,
        }
    }
}

/// Replace the condition with the same type, or append it.
pub fn upsert_condition(conditions: &mut Vec<Condition>, condition: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => *existing = condition,
        None => conditions.push(condition),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_upsert_replaces_same_type() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();

        let mut conditions = vec![Condition::ready(earlier), Condition::synced(earlier)];
        upsert_condition(&mut conditions, Condition::synced(later));

        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].last_transition_time, earlier);
        assert_eq!(conditions[1].type_, CONDITION_SYNCED);
        assert_eq!(conditions[1].last_transition_time, later);
    }

    #[test]
    fn test_upsert_appends_new_type() {
        let now = Utc::now();
        let mut conditions = Vec::new();
        upsert_condition(&mut conditions, Condition::ready(now));
        upsert_condition(&mut conditions, Condition::synced(now));

        let types: Vec<&str> = conditions.iter().map(|c| c.type_.as_str()).collect();
        assert_eq!(types, vec![CONDITION_READY, CONDITION_SYNCED]);
    }

    #[test]
    fn test_condition_serializes_type_field() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let value = serde_json::to_value(Condition::ready(now)).unwrap();
        assert_eq!(value["type"], "Ready");
        assert_eq!(value["status"], "True");
        assert_eq!(value["reason"], "Available");
        assert!(value.get("message").is_none());
    }
}
