//! The pure stage-transition core.

use crowdforge_aggregate::{Part, list_fragment, outline_labels, outline_parts, table_parts};
use crowdforge_model::{
  FlowKind, InstanceRecord, Params, Problem, Role, TaskResult, results_for, stage_records,
};
use crowdforge_render::{Candidate, CandidateStyle, render_candidates, shuffled};
use rand::Rng;

use crate::error::FlowError;
use crate::ratings::{Origin, rate_candidates};

/// Result field a map worker fills in.
pub const FACT_FIELD: &str = "fact";
/// Reduce parameter holding the map results as a list fragment.
pub const LIST_PARAM: &str = "list";
/// Parameter holding rendered candidate partitions.
pub const PARTITIONS_PARAM: &str = "partitions";

/// A task instance to issue, before rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRequest {
  pub role: Role,
  pub params: Params,
}

impl TaskRequest {
  pub fn new(role: Role, params: Params) -> Self {
    Self { role, params }
  }
}

/// What follows a resolved stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
  /// Move to `stage` and issue `tasks` for it. `tasks` may be empty.
  Advance { stage: Role, tasks: Vec<TaskRequest> },
  /// The terminal stage resolved.
  Finish,
}

/// Tasks issued when a problem starts: its partition, plus the column
/// partition of a table-style problem.
pub fn initial_tasks(problem: &Problem) -> Vec<TaskRequest> {
  let mut tasks = vec![TaskRequest::new(Role::Partition, Params::new())];
  if problem.roles.partition2.is_some() {
    tasks.push(TaskRequest::new(Role::Partition2, Params::new()));
  }
  tasks
}

/// Decide the next step for `problem` after `completed` resolved.
///
/// `history` is every task instance of the problem with its results. The
/// transition only reads it; calling this twice over the same history
/// gives the same stage and parameters (up to candidate order, which is
/// drawn from `rng`).
pub fn transition<R: Rng + ?Sized>(
  problem: &Problem,
  completed: Role,
  history: &[InstanceRecord],
  rng: &mut R,
) -> Result<Transition, FlowError> {
  let unexpected = || FlowError::UnexpectedStage {
    flow: problem.flow,
    stage: completed,
  };

  let next = match problem.flow {
    FlowKind::Basic => match completed {
      Role::Partition => advance(Role::Mapper, map_tasks(problem, history)),
      Role::Mapper => advance(Role::Reducer, reduce_tasks(history)?),
      Role::Reducer => Transition::Finish,
      _ => return Err(unexpected()),
    },

    FlowKind::VerifiedPartition => match completed {
      Role::Partition => {
        let candidates = candidates_for(history, &[Role::Partition]);
        advance(
          Role::PartitionVerify,
          candidate_task(Role::PartitionVerify, &candidates, CandidateStyle::Rated, rng)?,
        )
      }
      Role::PartitionVerify => {
        let parts = top_rated_parts(history)
          .into_iter()
          .map(Part::Outline)
          .collect::<Vec<_>>();
        advance(Role::Mapper, part_tasks(&parts))
      }
      Role::Mapper => advance(Role::Reducer, reduce_tasks(history)?),
      Role::Reducer => Transition::Finish,
      _ => return Err(unexpected()),
    },

    FlowKind::PartitionSelectionExperiment => match completed {
      Role::Partition => {
        let candidates = candidates_for(history, &[Role::Partition]);
        advance(
          Role::Reducer,
          candidate_task(Role::Reducer, &candidates, CandidateStyle::Listed, rng)?,
        )
      }
      Role::Reducer => {
        let candidates = candidates_for(history, &[Role::Partition, Role::Reducer]);
        advance(
          Role::Mapper,
          candidate_task(Role::Mapper, &candidates, CandidateStyle::Rated, rng)?,
        )
      }
      Role::Mapper => Transition::Finish,
      _ => return Err(unexpected()),
    },
  };

  Ok(next)
}

fn advance(stage: Role, tasks: Vec<TaskRequest>) -> Transition {
  Transition::Advance { stage, tasks }
}

fn part_tasks(parts: &[Part]) -> Vec<TaskRequest> {
  parts
    .iter()
    .map(|part| TaskRequest::new(Role::Mapper, part.to_params()))
    .collect()
}

/// One map task per part of the resolved partition.
fn map_tasks(problem: &Problem, history: &[InstanceRecord]) -> Vec<TaskRequest> {
  let rows = results_for(history, Role::Partition);

  let parts: Vec<Part> = if problem.roles.partition2.is_some() {
    table_parts(&rows, &results_for(history, Role::Partition2))
  } else {
    outline_parts(&rows).into_iter().map(Part::Outline).collect()
  };

  part_tasks(&parts)
}

/// One reduce task per map instance, in creation order. The map instance's
/// own parameters are laid over the list fragment of its facts.
fn reduce_tasks(history: &[InstanceRecord]) -> Result<Vec<TaskRequest>, FlowError> {
  stage_records(history, Role::Mapper)
    .into_iter()
    .map(|record| {
      let mut params = Params::new();
      params.insert(
        LIST_PARAM.to_string(),
        list_fragment(&record.results, FACT_FIELD)?,
      );
      params.extend(record.instance.params.clone());
      Ok(TaskRequest::new(Role::Reducer, params))
    })
    .collect()
}

/// Results of `roles`, each tagged with where it came from.
pub(crate) fn candidates_for(
  history: &[InstanceRecord],
  roles: &[Role],
) -> Vec<(TaskResult, Origin)> {
  roles
    .iter()
    .flat_map(|&role| {
      let origin = if role == Role::Partition {
        Origin::Original
      } else {
        Origin::Reduced
      };
      results_for(history, role)
        .into_iter()
        .map(move |result| (result, origin))
    })
    .collect()
}

/// A single task presenting `candidates` in random order. Nothing to
/// present means nothing to issue.
fn candidate_task<R: Rng + ?Sized>(
  role: Role,
  candidates: &[(TaskResult, Origin)],
  style: CandidateStyle,
  rng: &mut R,
) -> Result<Vec<TaskRequest>, FlowError> {
  if candidates.is_empty() {
    return Ok(Vec::new());
  }

  let candidates: Vec<Candidate> = candidates
    .iter()
    .map(|(result, _)| Candidate {
      candidate_id: result.result_id.clone(),
      parts: outline_labels(&result.value),
    })
    .collect();
  let markup = render_candidates(&shuffled(&candidates, rng), style)?;

  let params = Params::from([(PARTITIONS_PARAM.to_string(), markup)]);
  Ok(vec![TaskRequest::new(role, params)])
}

/// Parts of the partition that rated highest in verification.
fn top_rated_parts(history: &[InstanceRecord]) -> Vec<String> {
  let candidates = candidates_for(history, &[Role::Partition]);
  let ratings = rate_candidates(&candidates, &results_for(history, Role::PartitionVerify));

  crowdforge_aggregate::top_rated(&ratings.iter().map(|r| r.tally()).collect::<Vec<_>>())
    .and_then(|best| ratings.iter().find(|r| r.candidate_id == best.candidate_id))
    .map(|r| r.parts.clone())
    .unwrap_or_default()
}
