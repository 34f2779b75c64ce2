use std::fmt;

use serde::{Deserialize, Serialize};

/// The flow variant that governs a problem.
///
/// The set is closed: every variant has its transition logic in
/// `crowdforge-flow`, and exhaustiveness is checked at compile time.
/// The aliases accept the class-style names used by older definition files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
  /// partition -> map -> reduce
  #[serde(alias = "SimpleFlow")]
  Basic,
  /// partition -> partition verification (rating) -> map -> reduce
  #[serde(alias = "VerificationFlow")]
  VerifiedPartition,
  /// partition -> reduce (refine) -> map (vote)
  #[serde(alias = "PartitionSelectionExperimentFlow")]
  PartitionSelectionExperiment,
}

impl FlowKind {
  pub const ALL: [FlowKind; 3] = [
    FlowKind::Basic,
    FlowKind::VerifiedPartition,
    FlowKind::PartitionSelectionExperiment,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      FlowKind::Basic => "basic",
      FlowKind::VerifiedPartition => "verified_partition",
      FlowKind::PartitionSelectionExperiment => "partition_selection_experiment",
    }
  }

  /// Look up a flow kind by its canonical name.
  pub fn from_name(name: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|kind| kind.as_str() == name)
  }
}

impl fmt::Display for FlowKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_canonical_names_round_trip() {
    for kind in FlowKind::ALL {
      assert_eq!(FlowKind::from_name(kind.as_str()), Some(kind));
    }
    assert_eq!(FlowKind::from_name("nope"), None);
  }

  #[test]
  fn test_class_name_aliases() {
    let kind: FlowKind = serde_json::from_str("\"VerificationFlow\"").unwrap();
    assert_eq!(kind, FlowKind::VerifiedPartition);

    let kind: FlowKind = serde_json::from_str("\"SimpleFlow\"").unwrap();
    assert_eq!(kind, FlowKind::Basic);
  }
}
