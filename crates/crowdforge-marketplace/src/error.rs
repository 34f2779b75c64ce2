use thiserror::Error;

/// The marketplace refused a task. Never retried.
#[derive(Debug, Clone, Error)]
#[error("marketplace rejected task {task_id}: {message}")]
pub struct PostingError {
  pub task_id: String,
  pub message: String,
}

#[derive(Debug, Clone, Error)]
pub enum PollError {
  /// Transient failure talking to the marketplace. Safe to retry.
  #[error("polling task {external_id} failed: {message}")]
  Polling {
    external_id: String,
    message: String,
  },

  /// The marketplace no longer knows the task.
  #[error("marketplace does not know task {external_id}")]
  InvalidTask { external_id: String },
}

impl PollError {
  pub fn is_transient(&self) -> bool {
    matches!(self, PollError::Polling { .. })
  }
}
