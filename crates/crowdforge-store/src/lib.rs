//! CrowdForge Store
//!
//! This crate provides the storage trait and implementations for task
//! templates, problems, task instances and their results.
//!
//! The [`Store`] trait defines operations for:
//! - Creating and reading templates and problems
//! - Advancing or finishing a problem with a compare-and-set on its stage
//! - Tracking task instances and their external marketplace ids
//! - Appending results, at most one per assignment
//! - Reading a problem's full history

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use crowdforge_model::{InstanceRecord, Problem, Role, TaskInstance, TaskResult, TaskTemplate};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// A stored row could not be read back into a record.
  #[error("corrupt record: {0}")]
  Corrupt(String),
}

/// Storage trait for templates, problems, task instances and results.
#[async_trait]
pub trait Store: Send + Sync {
  /// Create a task template.
  async fn create_template(&self, template: &TaskTemplate) -> Result<(), Error>;

  /// Get a task template by ID.
  async fn get_template(&self, template_id: &str) -> Result<TaskTemplate, Error>;

  /// List all task templates.
  async fn list_templates(&self) -> Result<Vec<TaskTemplate>, Error>;

  /// Create a problem.
  async fn create_problem(&self, problem: &Problem) -> Result<(), Error>;

  /// Get a problem by ID.
  async fn get_problem(&self, problem_id: &str) -> Result<Problem, Error>;

  /// List all problems.
  async fn list_problems(&self) -> Result<Vec<Problem>, Error>;

  /// List problems whose status is active.
  async fn list_active_problems(&self) -> Result<Vec<Problem>, Error>;

  /// Move an active problem from stage `from` to `to` and insert `tasks`,
  /// in one atomic step.
  ///
  /// Returns `false` and changes nothing when the problem is not active or
  /// its current stage is not `from`.
  async fn advance_stage(
    &self,
    problem_id: &str,
    from: Option<Role>,
    to: Role,
    tasks: &[TaskInstance],
  ) -> Result<bool, Error>;

  /// Mark an active problem at `stage` finished. Returns `false` and
  /// changes nothing otherwise.
  async fn finish_problem(&self, problem_id: &str, stage: Role) -> Result<bool, Error>;

  /// Mark a problem stalled with a reason.
  async fn stall_problem(&self, problem_id: &str, reason: &str) -> Result<(), Error>;

  /// Get a task instance by ID.
  async fn get_task(&self, task_id: &str) -> Result<TaskInstance, Error>;

  /// List task instances for a problem, oldest first.
  async fn list_tasks(&self, problem_id: &str) -> Result<Vec<TaskInstance>, Error>;

  /// List active task instances across all problems, oldest first.
  async fn list_active_tasks(&self) -> Result<Vec<TaskInstance>, Error>;

  /// Record the marketplace id of a posted task instance.
  async fn assign_external_id(&self, task_id: &str, external_id: &str) -> Result<(), Error>;

  /// Resolve a task instance. Returns `false` if it was already resolved.
  async fn deactivate_task(&self, task_id: &str) -> Result<bool, Error>;

  /// Whether a result exists for an assignment.
  async fn has_result(&self, assignment_id: &str) -> Result<bool, Error>;

  /// Append a result. Returns `false` and stores nothing if a result for
  /// the same assignment already exists.
  async fn record_result(&self, result: &TaskResult) -> Result<bool, Error>;

  /// List results for a task instance, oldest first.
  async fn list_results(&self, task_id: &str) -> Result<Vec<TaskResult>, Error>;

  /// Every task instance of a problem with its results, oldest first.
  async fn problem_history(&self, problem_id: &str) -> Result<Vec<InstanceRecord>, Error>;
}
