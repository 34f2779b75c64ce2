use crowdforge_model::ResultValue;
use serde::{Deserialize, Serialize};

/// One worker's submission to a posted task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
  /// Globally unique across the marketplace.
  pub assignment_id: String,
  pub answers: ResultValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskStatus {
  pub expired: bool,
  /// Assignments submitted so far.
  pub submitted: u32,
}

/// Keywords as the marketplace accepts them: commas stripped and split on
/// whitespace.
pub fn posting_keywords(keywords: &[String]) -> Vec<String> {
  keywords
    .iter()
    .flat_map(|k| {
      k.replace(',', "")
        .split_whitespace()
        .map(str::to_string)
        .collect::<Vec<_>>()
    })
    .collect()
}
