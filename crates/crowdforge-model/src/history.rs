use serde::{Deserialize, Serialize};

use crate::result::TaskResult;
use crate::role::Role;
use crate::task::TaskInstance;

/// A task instance together with the results recorded for it so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
  pub instance: TaskInstance,
  pub results: Vec<TaskResult>,
}

/// Records whose instances belong to `stage`, in creation order.
pub fn stage_records(history: &[InstanceRecord], stage: Role) -> Vec<&InstanceRecord> {
  history
    .iter()
    .filter(|record| record.instance.role.stage() == stage)
    .collect()
}

/// Results of every instance issued for exactly `role`, in instance then
/// result order.
pub fn results_for(history: &[InstanceRecord], role: Role) -> Vec<TaskResult> {
  history
    .iter()
    .filter(|record| record.instance.role == role)
    .flat_map(|record| record.results.iter().cloned())
    .collect()
}

/// A stage is resolved when it has at least one instance and none of them
/// are still active. An empty stage is not evidence of completion.
pub fn is_stage_resolved(history: &[InstanceRecord], stage: Role) -> bool {
  let records = stage_records(history, stage);
  !records.is_empty() && records.iter().all(|r| r.instance.is_resolved())
}
