//! Scripted end-to-end runs against the simulated marketplace.
//!
//! A scenario is a definitions document plus scripted worker answers per
//! role:
//!
//! ```json
//! {
//!   "templates": [...],
//!   "problems": [...],
//!   "answers": {
//!     "partition": [{ "0": "Intro", "1": "Body" }],
//!     "mapper": [{ "fact": "..." }],
//!     "partition_verify": [{ "*": [5, 2] }]
//!   }
//! }
//! ```
//!
//! Each tick every open task gets the next answer for its role, in rotation.
//! In an answer, the key `"*"` stands for every candidate partition the task
//! presents. A single value goes to every candidate; a list is handed out to
//! the candidates in submission order. A role with no answers leaves its
//! tasks to expire.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crowdforge_config::ForgeDef;
use crowdforge_flow::{CandidateRating, FlowEngine, candidate_ratings};
use crowdforge_marketplace::{PostedTask, SimulatedMarketplace};
use crowdforge_model::{FlowKind, InstanceRecord, Problem, ResultValue, Role, resolve, results_for};
use crowdforge_scheduler::Scheduler;
use crowdforge_store::{MemoryStore, Store};

const EVERY_CANDIDATE: &str = "*";

#[derive(Debug, Deserialize)]
struct Scenario {
  #[serde(flatten)]
  definitions: ForgeDef,
  #[serde(default)]
  answers: HashMap<Role, Vec<ResultValue>>,
}

#[derive(Debug, Serialize)]
struct ProblemReport {
  problem: Problem,
  history: Vec<InstanceRecord>,
  #[serde(skip_serializing_if = "Option::is_none")]
  ratings: Option<Vec<CandidateRating>>,
}

#[derive(Debug, Serialize)]
struct SimulationReport {
  ticks: u32,
  problems: Vec<ProblemReport>,
}

pub async fn run(scenario_file: &Path, max_ticks: u32) -> Result<()> {
  let content = crate::read_defs(scenario_file).await?;
  let scenario: Scenario = serde_json::from_str(&content)
    .with_context(|| format!("invalid scenario file: {}", scenario_file.display()))?;
  scenario
    .definitions
    .validate()
    .with_context(|| format!("invalid definitions in {}", scenario_file.display()))?;

  let store = Arc::new(MemoryStore::new());
  let market = Arc::new(SimulatedMarketplace::new());
  let resolved = resolve(&scenario.definitions).context("failed to resolve definitions")?;
  crate::save_definitions(store.as_ref(), &resolved).await?;

  let scheduler = Scheduler::new(FlowEngine::new(store.clone(), market.clone()));
  let mut cursors: HashMap<Role, usize> = HashMap::new();
  let mut ticks = 0;

  while ticks < max_ticks {
    let report = scheduler.tick().await;
    ticks += 1;
    for failure in &report.failures {
      warn!(subject = %failure.subject, error = %failure.error, "tick_failure");
    }

    if store.list_active_problems().await?.is_empty() {
      break;
    }

    for task in market.open_tasks().await {
      let script = scenario.answers.get(&task.role).filter(|s| !s.is_empty());
      match script {
        Some(script) => {
          let cursor = cursors.entry(task.role).or_default();
          let answer = &script[*cursor % script.len()];
          *cursor += 1;
          let answer = expand_candidates(store.as_ref(), &task, answer).await?;
          market.submit(&task.external_id, answer).await?;
        }
        None => market.expire(&task.external_id).await?,
      }
    }
  }

  let mut problems = Vec::new();
  for problem in store.list_problems().await? {
    let history = store.problem_history(&problem.problem_id).await?;
    let ratings = candidate_ratings(&problem, &history).ok();
    problems.push(ProblemReport {
      problem,
      history,
      ratings,
    });
  }

  println!(
    "{}",
    serde_json::to_string_pretty(&SimulationReport { ticks, problems })?
  );
  Ok(())
}

/// Replace the `"*"` key of `answer` with one entry per candidate the task
/// presents.
async fn expand_candidates(
  store: &MemoryStore,
  task: &PostedTask,
  answer: &ResultValue,
) -> Result<ResultValue> {
  let Some(rating) = answer.get(EVERY_CANDIDATE) else {
    return Ok(answer.clone());
  };

  let problem = store.get_problem(&task.problem_id).await?;
  let history = store.problem_history(&task.problem_id).await?;
  let mut candidates = results_for(&history, Role::Partition);
  if problem.flow == FlowKind::PartitionSelectionExperiment {
    candidates.extend(results_for(&history, Role::Reducer));
  }

  let mut expanded: ResultValue = answer
    .iter()
    .filter(|(key, _)| key.as_str() != EVERY_CANDIDATE)
    .map(|(key, value)| (key.clone(), value.clone()))
    .collect();
  for (i, candidate) in candidates.into_iter().enumerate() {
    expanded
      .entry(candidate.result_id)
      .or_insert_with(|| nth_rating(rating, i));
  }
  Ok(expanded)
}

/// The rating the `i`th candidate gets from a `"*"` value.
fn nth_rating(rating: &serde_json::Value, i: usize) -> serde_json::Value {
  match rating {
    serde_json::Value::Array(values) if !values.is_empty() => values[i % values.len()].clone(),
    other => other.clone(),
  }
}
