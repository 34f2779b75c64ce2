//! Markup for candidate partitions and list fragments.

use std::ops::RangeInclusive;

use minijinja::Environment;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::error::RenderError;

/// The discrete rating scale every rating widget presents.
pub const RATING_SCALE: RangeInclusive<u8> = 1..=5;

const CANDIDATES_TEMPLATE: &str = r#"{% for candidate in candidates %}<div class="partition"><ol>{% for part in candidate.parts %}<li>{{ part }}</li>{% endfor %}</ol>{% if rated %}<table><tr>{% for value in scale %}<td><input type="radio" name="{{ candidate.candidate_id }}" value="{{ value }}" /></td>{% endfor %}</tr><tr>{% for value in scale %}<td>{{ value }}</td>{% endfor %}</tr></table>{% endif %}</div>{% endfor %}"#;

const LIST_ITEMS_TEMPLATE: &str = "{% for item in items %}<li>{{ item }}</li>{% endfor %}";

/// A worker-submitted partition offered for rating or refinement.
///
/// `candidate_id` is the id of the result that produced it, so ratings
/// submitted against the widget can be attributed back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
  pub candidate_id: String,
  pub parts: Vec<String>,
}

/// How candidates are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateStyle {
  /// Ordered list plus a rating widget named by the candidate id.
  Rated,
  /// Ordered list only, for workers refining a partition.
  Listed,
}

fn markup_env() -> Result<Environment<'static>, RenderError> {
  // `.html` names turn on HTML auto-escaping for worker-submitted text
  let mut env = Environment::new();
  env.add_template("candidates.html", CANDIDATES_TEMPLATE)?;
  env.add_template("list_items.html", LIST_ITEMS_TEMPLATE)?;
  Ok(env)
}

/// A copy of `candidates` in random order.
pub fn shuffled<R: Rng + ?Sized>(candidates: &[Candidate], rng: &mut R) -> Vec<Candidate> {
  let mut out = candidates.to_vec();
  out.shuffle(rng);
  out
}

/// Render candidates in the given order.
pub fn render_candidates(
  candidates: &[Candidate],
  style: CandidateStyle,
) -> Result<String, RenderError> {
  let env = markup_env()?;
  let template = env.get_template("candidates.html")?;
  let scale: Vec<u8> = RATING_SCALE.collect();

  let html = template.render(minijinja::context! {
    candidates => candidates,
    rated => style == CandidateStyle::Rated,
    scale => scale,
  })?;
  Ok(html)
}

/// Render `items` as concatenated `<li>` elements, preserving order.
pub fn list_items(items: &[String]) -> Result<String, RenderError> {
  let env = markup_env()?;
  let template = env.get_template("list_items.html")?;
  Ok(template.render(minijinja::context! { items => items })?)
}
