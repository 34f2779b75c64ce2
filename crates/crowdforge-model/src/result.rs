use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Answers submitted by one worker, keyed by form field.
pub type ResultValue = BTreeMap<String, serde_json::Value>;

/// One worker's submitted answer to a task instance. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
  pub result_id: String,
  /// Marketplace assignment id. Unique across all results.
  pub assignment_id: String,
  pub task_id: String,
  pub value: ResultValue,
  pub created_at: DateTime<Utc>,
}

/// Text of an answer field. Strings, numbers and booleans have a text form;
/// null, arrays and objects do not.
pub fn value_text(value: &serde_json::Value) -> Option<String> {
  match value {
    serde_json::Value::String(s) => Some(s.clone()),
    serde_json::Value::Number(n) => Some(n.to_string()),
    serde_json::Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}
