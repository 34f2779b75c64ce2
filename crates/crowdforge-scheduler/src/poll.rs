//! Per-task marketplace checks.

use chrono::Utc;
use crowdforge_marketplace::{ResultPoller, StatusQuery};
use crowdforge_model::{TaskInstance, TaskResult, new_id};
use crowdforge_store::Store;

use crate::error::TickError;

fn external_id(task: &TaskInstance) -> Result<&str, TickError> {
  task.external_id.as_deref().ok_or_else(|| {
    crowdforge_store::Error::NotFound(format!("external id of task {}", task.task_id)).into()
  })
}

/// Record every assignment of `task` not seen before and return the new
/// results.
pub async fn fetch_new_results<S, P>(
  store: &S,
  poller: &P,
  task: &TaskInstance,
) -> Result<Vec<TaskResult>, TickError>
where
  S: Store + ?Sized,
  P: ResultPoller + ?Sized,
{
  let assignments = poller.fetch_assignments(external_id(task)?).await?;

  let mut results = Vec::new();
  for assignment in assignments {
    if store.has_result(&assignment.assignment_id).await? {
      continue;
    }
    let result = TaskResult {
      result_id: new_id(),
      assignment_id: assignment.assignment_id,
      task_id: task.task_id.clone(),
      value: assignment.answers,
      created_at: Utc::now(),
    };
    // The marketplace may list the same assignment twice.
    if store.record_result(&result).await? {
      results.push(result);
    }
  }

  Ok(results)
}

/// Whether `task` expired on the marketplace. Resolves it if so.
pub async fn is_expired<S, Q>(store: &S, query: &Q, task: &TaskInstance) -> Result<bool, TickError>
where
  S: Store + ?Sized,
  Q: StatusQuery + ?Sized,
{
  let status = query.status(external_id(task)?).await?;
  if !status.expired {
    return Ok(false);
  }
  store.deactivate_task(&task.task_id).await?;
  Ok(true)
}

/// Whether `task` has collected `max_assignments` submissions. Resolves
/// it if so.
pub async fn is_complete<S, Q>(
  store: &S,
  query: &Q,
  task: &TaskInstance,
  max_assignments: u32,
) -> Result<bool, TickError>
where
  S: Store + ?Sized,
  Q: StatusQuery + ?Sized,
{
  let status = query.status(external_id(task)?).await?;
  if status.submitted < max_assignments {
    return Ok(false);
  }
  store.deactivate_task(&task.task_id).await?;
  Ok(true)
}
