use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// The slot a task template occupies in a problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Partition,
  /// Column headers of a table-style partition. Runs in the partition stage.
  Partition2,
  Mapper,
  Reducer,
  PartitionVerify,
  MapperVerify,
  ReducerVerify,
}

impl Role {
  pub const ALL: [Role; 7] = [
    Role::Partition,
    Role::Partition2,
    Role::Mapper,
    Role::Reducer,
    Role::PartitionVerify,
    Role::MapperVerify,
    Role::ReducerVerify,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Role::Partition => "partition",
      Role::Partition2 => "partition2",
      Role::Mapper => "mapper",
      Role::Reducer => "reducer",
      Role::PartitionVerify => "partition_verify",
      Role::MapperVerify => "mapper_verify",
      Role::ReducerVerify => "reducer_verify",
    }
  }

  /// The stage an instance of this role belongs to.
  pub fn stage(&self) -> Role {
    match self {
      Role::Partition2 => Role::Partition,
      other => *other,
    }
  }

  /// Whether this role can be a problem's current stage.
  pub fn is_stage(&self) -> bool {
    self.stage() == *self
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Role {
  type Err = ModelError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Role::ALL
      .into_iter()
      .find(|role| role.as_str() == s)
      .ok_or_else(|| ModelError::UnknownRole(s.to_string()))
  }
}
