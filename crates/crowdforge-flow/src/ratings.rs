//! The ratings query.
//!
//! Rated flows collect votes over candidate partitions. A vote result maps
//! candidate ids (the result ids of the partitions shown) to a value on the
//! rating scale.

use std::collections::HashMap;

use crowdforge_aggregate::{RatingTally, outline_labels, tally_ratings};
use crowdforge_model::{FlowKind, InstanceRecord, Problem, Role, TaskResult, results_for};
use serde::{Deserialize, Serialize};

use crate::error::FlowError;
use crate::transition::candidates_for;

/// Which stage produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
  /// Submitted in the partition stage.
  Original,
  /// Submitted as a refinement in the reduce stage.
  Reduced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRating {
  pub candidate_id: String,
  pub parts: Vec<String>,
  pub rating: f64,
  pub respondents: u32,
  pub origin: Origin,
}

impl CandidateRating {
  pub(crate) fn tally(&self) -> RatingTally {
    RatingTally {
      candidate_id: self.candidate_id.clone(),
      mean: self.rating,
      respondents: self.respondents,
    }
  }
}

/// Tally `votes` over `candidates`, in first-seen order. Votes naming
/// anything other than a known candidate are ignored.
pub(crate) fn rate_candidates(
  candidates: &[(TaskResult, Origin)],
  votes: &[TaskResult],
) -> Vec<CandidateRating> {
  let known: HashMap<&str, &(TaskResult, Origin)> = candidates
    .iter()
    .map(|c| (c.0.result_id.as_str(), c))
    .collect();

  tally_ratings(votes)
    .into_iter()
    .filter_map(|tally| {
      let (result, origin) = known.get(tally.candidate_id.as_str())?;
      Some(CandidateRating {
        parts: outline_labels(&result.value),
        rating: tally.mean,
        respondents: tally.respondents,
        origin: *origin,
        candidate_id: tally.candidate_id,
      })
    })
    .collect()
}

/// Every rated candidate of `problem` with its running-mean rating.
pub fn candidate_ratings(
  problem: &Problem,
  history: &[InstanceRecord],
) -> Result<Vec<CandidateRating>, FlowError> {
  let (candidates, votes) = match problem.flow {
    FlowKind::PartitionSelectionExperiment => (
      candidates_for(history, &[Role::Partition, Role::Reducer]),
      results_for(history, Role::Mapper),
    ),
    FlowKind::VerifiedPartition => (
      candidates_for(history, &[Role::Partition]),
      results_for(history, Role::PartitionVerify),
    ),
    FlowKind::Basic => return Err(FlowError::NoRatings { flow: problem.flow }),
  };

  Ok(rate_candidates(&candidates, &votes))
}
