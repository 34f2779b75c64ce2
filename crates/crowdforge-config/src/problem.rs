use serde::{Deserialize, Serialize};

use crate::flow::FlowKind;

/// Definition of a problem: a flow kind plus templates bound to roles.
///
/// Every template field holds the `name` of a [`TaskTemplateDef`](crate::TaskTemplateDef).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemDef {
  pub name: String,
  pub flow: FlowKind,
  pub partition: String,
  /// Second partition axis for table-style partitioning.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub partition2: Option<String>,
  pub mapper: String,
  pub reducer: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub partition_verify: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mapper_verify: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reducer_verify: Option<String>,
}

impl ProblemDef {
  /// All template names referenced by this problem, paired with their role name.
  pub fn template_refs(&self) -> Vec<(&'static str, &str)> {
    let mut refs = vec![
      ("partition", self.partition.as_str()),
      ("mapper", self.mapper.as_str()),
      ("reducer", self.reducer.as_str()),
    ];
    let optional = [
      ("partition2", &self.partition2),
      ("partition_verify", &self.partition_verify),
      ("mapper_verify", &self.mapper_verify),
      ("reducer_verify", &self.reducer_verify),
    ];
    for (role, name) in optional {
      if let Some(name) = name {
        refs.push((role, name.as_str()));
      }
    }
    refs
  }
}
