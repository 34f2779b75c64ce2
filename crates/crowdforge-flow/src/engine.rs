//! The flow engine.
//!
//! `FlowEngine` drives problems through their stages. Each advance renders
//! the next stage's tasks, then moves the problem and inserts the tasks in
//! one compare-and-set on the store, then posts the tasks. A duplicate
//! notification for a stage that already advanced fails the compare-and-set
//! and creates nothing.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use crowdforge_marketplace::TaskPoster;
use crowdforge_model::{
  InstanceRecord, Problem, Role, TaskInstance, TaskResult, TaskTemplate, is_stage_resolved,
  new_id,
};
use crowdforge_render::render_task;
use crowdforge_store::Store;
use tracing::{error, info, instrument, warn};

use crate::error::FlowError;
use crate::events::{FlowEvent, FlowNotifier, NoopNotifier};
use crate::ratings::{CandidateRating, candidate_ratings};
use crate::transition::{TaskRequest, Transition, initial_tasks, transition};

/// Where a problem ended up after a stage completed.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
  /// The problem is now at `stage`, waiting on `tasks`.
  Advanced {
    stage: Role,
    tasks: Vec<TaskInstance>,
  },
  /// The problem finished at `stage`.
  Finished { stage: Role },
}

/// The stage-transition engine.
///
/// Generic over `N: FlowNotifier` to allow different notification strategies.
/// Use `FlowEngine::new()` for a default engine with no-op notifications,
/// or `FlowEngine::with_notifier()` to provide a custom notifier.
pub struct FlowEngine<S: Store, P: TaskPoster, N: FlowNotifier = NoopNotifier> {
  store: Arc<S>,
  poster: Arc<P>,
  notifier: N,
}

impl<S: Store, P: TaskPoster> FlowEngine<S, P, NoopNotifier> {
  /// Create a new engine with no-op notifications.
  pub fn new(store: Arc<S>, poster: Arc<P>) -> Self {
    Self::with_notifier(store, poster, NoopNotifier)
  }
}

impl<S: Store, P: TaskPoster, N: FlowNotifier> FlowEngine<S, P, N> {
  /// Create a new engine with a custom notifier.
  pub fn with_notifier(store: Arc<S>, poster: Arc<P>, notifier: N) -> Self {
    Self {
      store,
      poster,
      notifier,
    }
  }

  pub fn store(&self) -> &Arc<S> {
    &self.store
  }

  pub fn poster(&self) -> &Arc<P> {
    &self.poster
  }

  /// Move a not-yet-started problem into its partition stage.
  #[instrument(name = "flow_start", skip(self, problem_id), fields(problem_id = %problem_id))]
  pub async fn start(&self, problem_id: &str) -> Result<Vec<TaskInstance>, FlowError> {
    let problem = self.store.get_problem(problem_id).await?;
    if !problem.is_active() {
      return Err(FlowError::Inactive {
        problem_id: problem_id.to_string(),
      });
    }
    if problem.current_stage.is_some() {
      return Err(FlowError::StageMismatch {
        problem_id: problem_id.to_string(),
        expected: None,
        current: problem.current_stage,
      });
    }

    info!(problem_id = %problem_id, flow = %problem.flow, "problem_started");
    self.notifier.notify(FlowEvent::ProblemStarted {
      problem_id: problem_id.to_string(),
    });

    self
      .issue(&problem, None, Role::Partition, initial_tasks(&problem))
      .await
  }

  /// Advance a problem whose current stage has resolved.
  ///
  /// Stages that come out empty are skipped: the problem moves through them
  /// with no results until a stage issues tasks or the flow finishes.
  #[instrument(
    name = "flow_stage_completed",
    skip(self, problem_id, stage),
    fields(problem_id = %problem_id, stage = %stage)
  )]
  pub async fn on_stage_completed(
    &self,
    problem_id: &str,
    stage: Role,
  ) -> Result<StageOutcome, FlowError> {
    let problem = self.store.get_problem(problem_id).await?;
    if !problem.is_active() {
      return Err(FlowError::Inactive {
        problem_id: problem_id.to_string(),
      });
    }
    if problem.current_stage != Some(stage) {
      return Err(FlowError::StageMismatch {
        problem_id: problem_id.to_string(),
        expected: Some(stage),
        current: problem.current_stage,
      });
    }

    let history = self.store.problem_history(problem_id).await?;
    if !is_stage_resolved(&history, stage) {
      return Err(FlowError::StageUnresolved {
        problem_id: problem_id.to_string(),
        stage,
      });
    }

    let mut skipped = false;
    let outcome = self
      .cascade(&problem, stage, &history, &mut skipped)
      .await;
    if skipped {
      if let Err(e) = &outcome {
        self.stall_stranded(problem_id, e).await;
      }
    }
    outcome
  }

  async fn cascade(
    &self,
    problem: &Problem,
    stage: Role,
    history: &[InstanceRecord],
    skipped: &mut bool,
  ) -> Result<StageOutcome, FlowError> {
    let problem_id = problem.problem_id.as_str();
    let mut completed = stage;
    loop {
      match self.next_transition(problem, completed, history).await? {
        Transition::Finish => {
          if !self.store.finish_problem(problem_id, completed).await? {
            return Err(self.stage_mismatch(problem_id, Some(completed)).await);
          }
          info!(problem_id = %problem_id, stage = %completed, "problem_finished");
          self.notifier.notify(FlowEvent::ProblemFinished {
            problem_id: problem_id.to_string(),
            stage: completed,
          });
          return Ok(StageOutcome::Finished { stage: completed });
        }

        Transition::Advance { stage: next, tasks } if tasks.is_empty() => {
          if !self
            .store
            .advance_stage(problem_id, Some(completed), next, &[])
            .await?
          {
            return Err(self.stage_mismatch(problem_id, Some(completed)).await);
          }
          *skipped = true;
          info!(problem_id = %problem_id, from = %completed, to = %next, "empty_stage_skipped");
          self.notifier.notify(FlowEvent::StageAdvanced {
            problem_id: problem_id.to_string(),
            from: Some(completed),
            to: next,
            tasks: 0,
          });
          completed = next;
        }

        Transition::Advance { stage: next, tasks } => {
          let tasks = self.issue(problem, Some(completed), next, tasks).await?;
          return Ok(StageOutcome::Advanced { stage: next, tasks });
        }
      }
    }
  }

  /// A task reached its assignment capacity.
  pub fn on_hit_complete(&self, task: &TaskInstance) {
    info!(problem_id = %task.problem_id, task_id = %task.task_id, "hit_complete");
    self.notifier.notify(FlowEvent::HitComplete {
      problem_id: task.problem_id.clone(),
      task_id: task.task_id.clone(),
    });
  }

  /// A task expired on the marketplace.
  pub fn on_hit_expired(&self, task: &TaskInstance) {
    info!(problem_id = %task.problem_id, task_id = %task.task_id, "hit_expired");
    self.notifier.notify(FlowEvent::HitExpired {
      problem_id: task.problem_id.clone(),
      task_id: task.task_id.clone(),
    });
  }

  /// New results were recorded for a task.
  pub fn on_results_retrieved(&self, task: &TaskInstance, results: &[TaskResult]) {
    info!(
      problem_id = %task.problem_id,
      task_id = %task.task_id,
      count = results.len(),
      "results_retrieved"
    );
    self.notifier.notify(FlowEvent::ResultsRetrieved {
      problem_id: task.problem_id.clone(),
      task_id: task.task_id.clone(),
      count: results.len(),
    });
  }

  /// The marketplace no longer knows a task. It has already been resolved.
  pub fn on_hit_invalid(&self, task: &TaskInstance) {
    error!(problem_id = %task.problem_id, task_id = %task.task_id, "hit_invalid");
    self.notifier.notify(FlowEvent::HitInvalid {
      problem_id: task.problem_id.clone(),
      task_id: task.task_id.clone(),
    });
  }

  /// Ratings collected so far for a problem's candidate partitions.
  pub async fn ratings(&self, problem_id: &str) -> Result<Vec<CandidateRating>, FlowError> {
    let problem = self.store.get_problem(problem_id).await?;
    let history = self.store.problem_history(problem_id).await?;
    candidate_ratings(&problem, &history)
  }

  async fn next_transition(
    &self,
    problem: &Problem,
    completed: Role,
    history: &[InstanceRecord],
  ) -> Result<Transition, FlowError> {
    let next = {
      let mut rng = rand::rng();
      transition(problem, completed, history, &mut rng)
    };

    match next {
      Err(FlowError::Render(e)) => {
        self.stall(&problem.problem_id, &e.to_string()).await?;
        Err(FlowError::Render(e))
      }
      other => other,
    }
  }

  /// Render `requests`, advance the problem from `from` to `to` with the
  /// rendered instances, then post them.
  async fn issue(
    &self,
    problem: &Problem,
    from: Option<Role>,
    to: Role,
    requests: Vec<TaskRequest>,
  ) -> Result<Vec<TaskInstance>, FlowError> {
    let problem_id = problem.problem_id.as_str();
    let mut templates: HashMap<String, TaskTemplate> = HashMap::new();
    let mut tasks = Vec::with_capacity(requests.len());

    for request in requests {
      let template_id = problem
        .roles
        .template_for(request.role)
        .ok_or(FlowError::MissingRole {
          problem_id: problem_id.to_string(),
          role: request.role,
        })?;
      if !templates.contains_key(template_id) {
        let template = self.store.get_template(template_id).await?;
        templates.insert(template_id.to_string(), template);
      }
      let template = &templates[template_id];

      let rendered = match render_task(template, &request.params) {
        Ok(rendered) => rendered,
        Err(e) => {
          self.stall(problem_id, &e.to_string()).await?;
          return Err(e.into());
        }
      };

      tasks.push(TaskInstance {
        task_id: new_id(),
        external_id: None,
        template_id: template_id.to_string(),
        problem_id: problem_id.to_string(),
        role: request.role,
        params: request.params,
        title: rendered.title,
        description: rendered.description,
        body: rendered.body,
        is_active: true,
        created_at: Utc::now(),
      });
    }

    if !self.store.advance_stage(problem_id, from, to, &tasks).await? {
      return Err(self.stage_mismatch(problem_id, from).await);
    }
    info!(
      problem_id = %problem_id,
      to = %to,
      tasks = tasks.len(),
      "stage_advanced"
    );
    self.notifier.notify(FlowEvent::StageAdvanced {
      problem_id: problem_id.to_string(),
      from,
      to,
      tasks: tasks.len(),
    });

    for i in 0..tasks.len() {
      let template = &templates[&tasks[i].template_id];
      let external_id = match self.poster.post(template, &tasks[i]).await {
        Ok(external_id) => external_id,
        Err(e) => {
          // Nothing after the failed task gets posted either.
          self.abandon(problem_id, &mut tasks[i..], &e.to_string()).await;
          return Err(e.into());
        }
      };
      if let Err(e) = self
        .store
        .assign_external_id(&tasks[i].task_id, &external_id)
        .await
      {
        let reason = format!(
          "task {} was posted as {} but its id could not be recorded: {}",
          tasks[i].task_id, external_id, e
        );
        self.abandon(problem_id, &mut tasks[i..], &reason).await;
        return Err(e.into());
      }
      tasks[i].external_id = Some(external_id);
    }

    Ok(tasks)
  }

  /// Resolve the unposted `tasks` of an advanced stage and stall the problem.
  async fn abandon(&self, problem_id: &str, tasks: &mut [TaskInstance], reason: &str) {
    for task in tasks.iter_mut() {
      match self.store.deactivate_task(&task.task_id).await {
        Ok(_) => task.is_active = false,
        Err(e) => {
          warn!(problem_id = %problem_id, task_id = %task.task_id, error = %e, "task_deactivate_failed")
        }
      }
    }
    if let Err(e) = self.stall(problem_id, reason).await {
      error!(problem_id = %problem_id, error = %e, "problem_stall_failed");
    }
  }

  /// Stall a problem that was left in a skipped stage with no tasks. A
  /// problem that already stalled, or that another writer moved on, is left
  /// alone.
  async fn stall_stranded(&self, problem_id: &str, cause: &FlowError) {
    if matches!(cause, FlowError::StageMismatch { .. }) {
      return;
    }
    match self.store.get_problem(problem_id).await {
      Ok(problem) if problem.is_active() => {
        if let Err(e) = self.stall(problem_id, &cause.to_string()).await {
          error!(problem_id = %problem_id, error = %e, "problem_stall_failed");
        }
      }
      Ok(_) => {}
      Err(e) => error!(problem_id = %problem_id, error = %e, "problem_stall_failed"),
    }
  }

  async fn stall(&self, problem_id: &str, reason: &str) -> Result<(), FlowError> {
    error!(problem_id = %problem_id, reason = %reason, "problem_stalled");
    self.store.stall_problem(problem_id, reason).await?;
    self.notifier.notify(FlowEvent::ProblemStalled {
      problem_id: problem_id.to_string(),
      reason: reason.to_string(),
    });
    Ok(())
  }

  async fn stage_mismatch(&self, problem_id: &str, expected: Option<Role>) -> FlowError {
    match self.store.get_problem(problem_id).await {
      Ok(problem) => {
        warn!(problem_id = %problem_id, "stage_already_advanced");
        FlowError::StageMismatch {
          problem_id: problem_id.to_string(),
          expected,
          current: problem.current_stage,
        }
      }
      Err(e) => e.into(),
    }
  }
}
