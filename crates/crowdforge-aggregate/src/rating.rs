//! Rating aggregation.
//!
//! A rating result maps candidate ids to a value on the rating scale. Each
//! result may rate many candidates. Ratings are folded into a running mean
//! per candidate as they are seen.

use std::collections::HashMap;

use crowdforge_model::{TaskResult, value_text};
use crowdforge_render::RATING_SCALE;
use serde::{Deserialize, Serialize};

/// Running mean of the ratings one candidate received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingTally {
  pub candidate_id: String,
  pub mean: f64,
  pub respondents: u32,
}

impl RatingTally {
  pub fn new(candidate_id: impl Into<String>) -> Self {
    Self {
      candidate_id: candidate_id.into(),
      mean: 0.0,
      respondents: 0,
    }
  }

  /// Fold one rating into the mean.
  ///
  /// ```
  /// use crowdforge_aggregate::RatingTally;
  ///
  /// let mut tally = RatingTally::new("c1");
  /// tally.record(3.0);
  /// tally.record(5.0);
  /// assert_eq!(tally.mean, 4.0);
  /// assert_eq!(tally.respondents, 2);
  /// ```
  pub fn record(&mut self, rating: f64) {
    let n = f64::from(self.respondents);
    self.mean = (self.mean * n + rating) / (n + 1.0);
    self.respondents += 1;
  }
}

/// Parse a submitted rating. Accepts whole numbers and integer strings on
/// the rating scale; anything else is not a rating.
pub fn parse_rating(value: &serde_json::Value) -> Option<f64> {
  let rating: u8 = value_text(value)?.trim().parse().ok()?;
  RATING_SCALE.contains(&rating).then(|| f64::from(rating))
}

/// Tally every rating in `results`, in first-seen candidate order.
pub fn tally_ratings(results: &[TaskResult]) -> Vec<RatingTally> {
  let mut tallies: Vec<RatingTally> = Vec::new();
  let mut index: HashMap<String, usize> = HashMap::new();

  for result in results {
    for (candidate_id, value) in &result.value {
      let Some(rating) = parse_rating(value) else {
        continue;
      };
      let slot = *index.entry(candidate_id.clone()).or_insert_with(|| {
        tallies.push(RatingTally::new(candidate_id.clone()));
        tallies.len() - 1
      });
      tallies[slot].record(rating);
    }
  }

  tallies
}

/// The tally with the highest mean. The earliest one wins ties.
pub fn top_rated(tallies: &[RatingTally]) -> Option<&RatingTally> {
  tallies.iter().fold(None, |best: Option<&RatingTally>, tally| match best {
    Some(b) if b.mean >= tally.mean => Some(b),
    _ => Some(tally),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::result;
  use serde_json::json;

  #[test]
  fn test_running_mean_matches_direct_average() {
    let mut tally = RatingTally::new("c1");
    let mut means = Vec::new();
    for rating in [3.0, 5.0, 4.0] {
      tally.record(rating);
      means.push(tally.mean);
    }

    assert_eq!(means, vec![3.0, 4.0, 4.0]);
    assert!((tally.mean - (3.0 + 5.0 + 4.0) / 3.0).abs() < 1e-9);
    assert_eq!(tally.respondents, 3);
  }

  #[test]
  fn test_tally_across_results() {
    let results = vec![
      result("v1", json!({ "c1": "3", "c2": 5 })),
      result("v2", json!({ "c1": "5" })),
      result("v3", json!({ "c1": 4, "c2": "1" })),
    ];

    let tallies = tally_ratings(&results);
    assert_eq!(tallies.len(), 2);
    assert_eq!(tallies[0].candidate_id, "c1");
    assert_eq!(tallies[0].respondents, 3);
    assert!((tallies[0].mean - 4.0).abs() < 1e-9);
    assert_eq!(tallies[1].candidate_id, "c2");
    assert_eq!(tallies[1].mean, 3.0);
  }

  #[test]
  fn test_non_ratings_are_ignored() {
    let results = vec![result(
      "v1",
      json!({ "c1": "4", "comments": "nice", "c2": "9", "c3": "0", "c4": null }),
    )];

    let tallies = tally_ratings(&results);
    assert_eq!(tallies.len(), 1);
    assert_eq!(tallies[0].candidate_id, "c1");
  }

  #[test]
  fn test_fractional_ratings_are_rejected() {
    assert_eq!(parse_rating(&json!("2.5")), None);
    assert_eq!(parse_rating(&json!(2.5)), None);
    assert_eq!(parse_rating(&json!(" 3 ")), Some(3.0));
    assert_eq!(parse_rating(&json!(5)), Some(5.0));
  }

  #[test]
  fn test_top_rated_picks_highest_mean() {
    let results = vec![result("v1", json!({ "a": "2", "b": "5", "c": "4" }))];
    let tallies = tally_ratings(&results);

    assert_eq!(top_rated(&tallies).unwrap().candidate_id, "b");
  }

  #[test]
  fn test_top_rated_ties_go_to_first_seen() {
    let results = vec![
      result("v1", json!({ "b": "4" })),
      result("v2", json!({ "a": "4" })),
    ];
    let tallies = tally_ratings(&results);

    assert_eq!(tallies[0].candidate_id, "b");
    assert_eq!(top_rated(&tallies).unwrap().candidate_id, "b");
  }

  #[test]
  fn test_top_rated_empty() {
    assert!(top_rated(&[]).is_none());
  }
}
