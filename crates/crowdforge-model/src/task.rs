use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::role::Role;

/// Parameters substituted into a template when an instance is created.
pub type Params = BTreeMap<String, String>;

/// One concrete unit of work posted to the crowd.
///
/// Only `is_active` and `external_id` ever change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInstance {
  pub task_id: String,
  /// Marketplace id, set once posting succeeds.
  pub external_id: Option<String>,
  pub template_id: String,
  pub problem_id: String,
  pub role: Role,
  pub params: Params,
  pub title: String,
  pub description: String,
  pub body: String,
  pub is_active: bool,
  pub created_at: DateTime<Utc>,
}

impl TaskInstance {
  /// Whether the instance is closed (completed, expired or invalid).
  pub fn is_resolved(&self) -> bool {
    !self.is_active
  }
}
