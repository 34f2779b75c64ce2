use async_trait::async_trait;
use crowdforge_model::{ResultValue, Role, TaskInstance, TaskTemplate};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
  Assignment, PollError, PostingError, ResultPoller, StatusQuery, TaskPoster, TaskStatus,
  posting_keywords,
};

/// A task as the simulated marketplace holds it.
#[derive(Debug, Clone, Serialize)]
pub struct PostedTask {
  pub external_id: String,
  pub task_id: String,
  pub problem_id: String,
  pub role: Role,
  pub title: String,
  pub keywords: Vec<String>,
  pub max_assignments: u32,
  pub payment_cents: u32,
  pub expired: bool,
  pub assignments: Vec<Assignment>,
}

#[derive(Default)]
struct Inner {
  tasks: Vec<PostedTask>,
  posted: u64,
  submitted: u64,
  reject_next_post: Option<String>,
  fail_next_poll: Option<String>,
}

impl Inner {
  fn task_mut(&mut self, external_id: &str) -> Result<&mut PostedTask, PollError> {
    self
      .tasks
      .iter_mut()
      .find(|t| t.external_id == external_id)
      .ok_or_else(|| PollError::InvalidTask {
        external_id: external_id.to_string(),
      })
  }

  fn take_poll_failure(&mut self, external_id: &str) -> Result<(), PollError> {
    match self.fail_next_poll.take() {
      Some(message) => Err(PollError::Polling {
        external_id: external_id.to_string(),
        message,
      }),
      None => Ok(()),
    }
  }
}

/// In-memory marketplace for tests and scripted runs.
///
/// Workers are played by the caller: [`submit`](Self::submit) an answer,
/// [`expire`](Self::expire) a task, or [`forget`](Self::forget) it so the
/// next poll reports it invalid.
#[derive(Default)]
pub struct SimulatedMarketplace {
  inner: Mutex<Inner>,
}

impl SimulatedMarketplace {
  pub fn new() -> Self {
    Self::default()
  }

  /// Tasks posted so far, in posting order.
  pub async fn posted(&self) -> Vec<PostedTask> {
    self.inner.lock().await.tasks.clone()
  }

  /// Open tasks: posted, unexpired, with capacity left.
  pub async fn open_tasks(&self) -> Vec<PostedTask> {
    let inner = self.inner.lock().await;
    inner
      .tasks
      .iter()
      .filter(|t| !t.expired && (t.assignments.len() as u32) < t.max_assignments)
      .cloned()
      .collect()
  }

  /// Submit a worker's answers under a fresh assignment id.
  pub async fn submit(&self, external_id: &str, answers: ResultValue) -> Result<String, PollError> {
    let mut inner = self.inner.lock().await;
    inner.submitted += 1;
    let assignment_id = format!("ASSIGNMENT-{}", inner.submitted);
    inner.task_mut(external_id)?.assignments.push(Assignment {
      assignment_id: assignment_id.clone(),
      answers,
    });
    debug!(external_id = %external_id, assignment_id = %assignment_id, "assignment_submitted");
    Ok(assignment_id)
  }

  /// Submit an assignment with a caller-chosen id. The marketplace does not
  /// check the id for uniqueness.
  pub async fn submit_assignment(
    &self,
    external_id: &str,
    assignment: Assignment,
  ) -> Result<(), PollError> {
    let mut inner = self.inner.lock().await;
    inner.task_mut(external_id)?.assignments.push(assignment);
    Ok(())
  }

  pub async fn expire(&self, external_id: &str) -> Result<(), PollError> {
    let mut inner = self.inner.lock().await;
    inner.task_mut(external_id)?.expired = true;
    Ok(())
  }

  /// Drop a task, as if the marketplace had purged it.
  pub async fn forget(&self, external_id: &str) {
    let mut inner = self.inner.lock().await;
    inner.tasks.retain(|t| t.external_id != external_id);
  }

  /// Reject the next post with `reason`.
  pub async fn reject_next_post(&self, reason: impl Into<String>) {
    self.inner.lock().await.reject_next_post = Some(reason.into());
  }

  /// Fail the next poll or status query with a transient error.
  pub async fn fail_next_poll(&self, message: impl Into<String>) {
    self.inner.lock().await.fail_next_poll = Some(message.into());
  }
}

#[async_trait]
impl TaskPoster for SimulatedMarketplace {
  async fn post(
    &self,
    template: &TaskTemplate,
    task: &TaskInstance,
  ) -> Result<String, PostingError> {
    let mut inner = self.inner.lock().await;

    let rejection = inner.reject_next_post.take().or_else(|| {
      (template.payment_cents == 0).then(|| "reward must be positive".to_string())
    });
    if let Some(message) = rejection {
      return Err(PostingError {
        task_id: task.task_id.clone(),
        message,
      });
    }

    inner.posted += 1;
    let external_id = format!("HIT-{}", inner.posted);
    inner.tasks.push(PostedTask {
      external_id: external_id.clone(),
      task_id: task.task_id.clone(),
      problem_id: task.problem_id.clone(),
      role: task.role,
      title: task.title.clone(),
      keywords: posting_keywords(&template.keywords),
      max_assignments: template.max_assignments,
      payment_cents: template.payment_cents,
      expired: false,
      assignments: Vec::new(),
    });

    debug!(task_id = %task.task_id, external_id = %external_id, "task_posted");
    Ok(external_id)
  }
}

#[async_trait]
impl ResultPoller for SimulatedMarketplace {
  async fn fetch_assignments(&self, external_id: &str) -> Result<Vec<Assignment>, PollError> {
    let mut inner = self.inner.lock().await;
    inner.take_poll_failure(external_id)?;
    Ok(inner.task_mut(external_id)?.assignments.clone())
  }
}

#[async_trait]
impl StatusQuery for SimulatedMarketplace {
  async fn status(&self, external_id: &str) -> Result<TaskStatus, PollError> {
    let mut inner = self.inner.lock().await;
    inner.take_poll_failure(external_id)?;
    let task = inner.task_mut(external_id)?;
    Ok(TaskStatus {
      expired: task.expired,
      submitted: task.assignments.len() as u32,
    })
  }
}
