use serde::{Deserialize, Serialize};

/// Definition of a reusable kind of crowd work unit.
///
/// `title`, `description` and `body` are minijinja templates rendered
/// against the parameters of each task instance, e.g. `"Write about {{ topic }}"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTemplateDef {
  /// Name used by problem definitions to reference this template.
  pub name: String,
  pub title: String,
  pub description: String,
  pub body: String,
  #[serde(default)]
  pub keywords: Vec<String>,
  /// How many workers may complete one instance.
  #[serde(default = "default_max_assignments")]
  pub max_assignments: u32,
  /// Reward per assignment, in cents.
  #[serde(default = "default_payment_cents")]
  pub payment_cents: u32,
  #[serde(default = "default_duration_seconds")]
  pub duration_seconds: u64,
  #[serde(default = "default_approval_delay_seconds")]
  pub approval_delay_seconds: u64,
  #[serde(default = "default_lifetime_seconds")]
  pub lifetime_seconds: u64,
}

fn default_max_assignments() -> u32 {
  1
}

fn default_payment_cents() -> u32 {
  5
}

fn default_duration_seconds() -> u64 {
  30
}

fn default_approval_delay_seconds() -> u64 {
  60 * 3
}

fn default_lifetime_seconds() -> u64 {
  60 * 24
}
