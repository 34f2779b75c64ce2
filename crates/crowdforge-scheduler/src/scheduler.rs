use std::time::Duration;

use crowdforge_flow::{FlowEngine, FlowNotifier, NoopNotifier, StageOutcome};
use crowdforge_marketplace::{Marketplace, PollError};
use crowdforge_model::{Problem, TaskInstance, is_stage_resolved};
use crowdforge_store::Store;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::error::TickError;
use crate::poll::{fetch_new_results, is_complete, is_expired};

/// A task or problem the tick could not process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickFailure {
  /// Task or problem id.
  pub subject: String,
  pub error: String,
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
  pub results_recorded: usize,
  pub tasks_closed: usize,
  pub tasks_invalid: usize,
  pub problems_started: usize,
  pub stages_advanced: usize,
  pub problems_finished: usize,
  pub failures: Vec<TickFailure>,
}

impl TickReport {
  /// Whether the tick changed anything.
  pub fn made_progress(&self) -> bool {
    self.results_recorded
      + self.tasks_closed
      + self.tasks_invalid
      + self.problems_started
      + self.stages_advanced
      + self.problems_finished
      > 0
  }

  fn fail(&mut self, subject: &str, err: &TickError) {
    self.failures.push(TickFailure {
      subject: subject.to_string(),
      error: err.to_string(),
    });
  }
}

/// Drives problems forward from marketplace state.
///
/// The engine is built once at process start and handed in. Ticks must not
/// overlap; [`run`](Self::run) serializes them.
pub struct Scheduler<S: Store, M: Marketplace, N: FlowNotifier = NoopNotifier> {
  engine: FlowEngine<S, M, N>,
}

impl<S: Store, M: Marketplace, N: FlowNotifier> Scheduler<S, M, N> {
  pub fn new(engine: FlowEngine<S, M, N>) -> Self {
    Self { engine }
  }

  pub fn engine(&self) -> &FlowEngine<S, M, N> {
    &self.engine
  }

  /// Run a single tick.
  #[instrument(name = "scheduler_tick", skip(self))]
  pub async fn tick(&self) -> TickReport {
    let mut report = TickReport::default();

    match self.engine.store().list_active_tasks().await {
      Ok(tasks) => {
        for task in &tasks {
          match self.poll_task(task, &mut report).await {
            Ok(()) => {}
            Err(TickError::Poll(PollError::InvalidTask { external_id })) => {
              self.invalidate(task, &external_id, &mut report).await;
            }
            Err(e) => {
              warn!(task_id = %task.task_id, error = %e, "task_poll_failed");
              report.fail(&task.task_id, &e);
            }
          }
        }
      }
      Err(e) => {
        let e = TickError::from(e);
        error!(error = %e, "list_active_tasks_failed");
        report.fail("tasks", &e);
      }
    }

    match self.engine.store().list_active_problems().await {
      Ok(problems) => {
        for problem in &problems {
          if let Err(e) = self.advance_problem(problem, &mut report).await {
            warn!(problem_id = %problem.problem_id, error = %e, "problem_advance_failed");
            report.fail(&problem.problem_id, &e);
          }
        }
      }
      Err(e) => {
        let e = TickError::from(e);
        error!(error = %e, "list_active_problems_failed");
        report.fail("problems", &e);
      }
    }

    report
  }

  /// Tick every `interval` until `cancel` fires.
  pub async fn run(&self, interval: Duration, cancel: CancellationToken) {
    info!(interval_ms = interval.as_millis() as u64, "starting scheduler");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
      tokio::select! {
          _ = cancel.cancelled() => {
              info!("scheduler cancelled");
              break;
          }
          _ = ticker.tick() => {
              let report = self.tick().await;
              if report.made_progress() || !report.failures.is_empty() {
                  info!(
                      results = report.results_recorded,
                      closed = report.tasks_closed,
                      advanced = report.stages_advanced,
                      finished = report.problems_finished,
                      failures = report.failures.len(),
                      "tick completed"
                  );
              }
          }
      }
    }
  }

  async fn poll_task(&self, task: &TaskInstance, report: &mut TickReport) -> Result<(), TickError> {
    if task.external_id.is_none() {
      // Never posted, or posted without its id recorded. The engine
      // resolves such tasks and stalls their problem.
      return Ok(());
    }
    let store = self.engine.store().as_ref();
    let market = self.engine.poster().as_ref();

    let results = fetch_new_results(store, market, task).await?;
    if !results.is_empty() {
      report.results_recorded += results.len();
      self.engine.on_results_retrieved(task, &results);
    }

    if is_expired(store, market, task).await? {
      report.tasks_closed += 1;
      self.engine.on_hit_expired(task);
      return Ok(());
    }

    let template = store.get_template(&task.template_id).await?;
    if is_complete(store, market, task, template.max_assignments).await? {
      report.tasks_closed += 1;
      self.engine.on_hit_complete(task);
    }

    Ok(())
  }

  async fn invalidate(&self, task: &TaskInstance, external_id: &str, report: &mut TickReport) {
    error!(task_id = %task.task_id, external_id = %external_id, "invalid_task");
    match self.engine.store().deactivate_task(&task.task_id).await {
      Ok(_) => {
        report.tasks_invalid += 1;
        self.engine.on_hit_invalid(task);
      }
      Err(e) => report.fail(&task.task_id, &TickError::from(e)),
    }
  }

  async fn advance_problem(
    &self,
    problem: &Problem,
    report: &mut TickReport,
  ) -> Result<(), TickError> {
    let Some(stage) = problem.current_stage else {
      self.engine.start(&problem.problem_id).await?;
      report.problems_started += 1;
      return Ok(());
    };

    let history = self.engine.store().problem_history(&problem.problem_id).await?;
    if !is_stage_resolved(&history, stage) {
      return Ok(());
    }

    match self.engine.on_stage_completed(&problem.problem_id, stage).await? {
      StageOutcome::Advanced { .. } => report.stages_advanced += 1,
      StageOutcome::Finished { .. } => report.problems_finished += 1,
    }
    Ok(())
  }
}
