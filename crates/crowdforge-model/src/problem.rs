use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::FlowKind;
use crate::error::ModelError;
use crate::role::Role;

/// Lifecycle status of a problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemStatus {
  Active,
  /// The terminal stage completed.
  Finished,
  /// A task could not be rendered or posted; needs an operator.
  Stalled,
}

impl ProblemStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      ProblemStatus::Active => "active",
      ProblemStatus::Finished => "finished",
      ProblemStatus::Stalled => "stalled",
    }
  }
}

impl fmt::Display for ProblemStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ProblemStatus {
  type Err = ModelError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "active" => Ok(ProblemStatus::Active),
      "finished" => Ok(ProblemStatus::Finished),
      "stalled" => Ok(ProblemStatus::Stalled),
      other => Err(ModelError::UnknownStatus(other.to_string())),
    }
  }
}

/// Template ids bound to each role of a problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleBindings {
  pub partition: String,
  pub partition2: Option<String>,
  pub mapper: String,
  pub reducer: String,
  pub partition_verify: Option<String>,
  pub mapper_verify: Option<String>,
  pub reducer_verify: Option<String>,
}

impl RoleBindings {
  /// The template id bound to `role`, if the problem configures one.
  pub fn template_for(&self, role: Role) -> Option<&str> {
    match role {
      Role::Partition => Some(self.partition.as_str()),
      Role::Partition2 => self.partition2.as_deref(),
      Role::Mapper => Some(self.mapper.as_str()),
      Role::Reducer => Some(self.reducer.as_str()),
      Role::PartitionVerify => self.partition_verify.as_deref(),
      Role::MapperVerify => self.mapper_verify.as_deref(),
      Role::ReducerVerify => self.reducer_verify.as_deref(),
    }
  }
}

/// One workflow execution. Never reused across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
  pub problem_id: String,
  pub name: String,
  pub flow: FlowKind,
  /// `None` until the flow starts.
  pub current_stage: Option<Role>,
  pub status: ProblemStatus,
  pub stall_reason: Option<String>,
  pub roles: RoleBindings,
}

impl Problem {
  pub fn is_active(&self) -> bool {
    self.status == ProblemStatus::Active
  }

  pub fn is_started(&self) -> bool {
    self.current_stage.is_some()
  }
}
