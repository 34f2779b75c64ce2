use serde::{Deserialize, Serialize};

/// A reusable kind of work unit, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTemplate {
  pub template_id: String,
  pub name: String,
  pub title: String,
  pub description: String,
  pub body: String,
  pub keywords: Vec<String>,
  pub max_assignments: u32,
  pub payment_cents: u32,
  pub duration_seconds: u64,
  pub approval_delay_seconds: u64,
  pub lifetime_seconds: u64,
}
