use crowdforge_marketplace::PostingError;
use crowdforge_model::{FlowKind, Role};
use crowdforge_render::RenderError;
use thiserror::Error;

fn stage_label(stage: &Option<Role>) -> &'static str {
  stage.map(|r| r.as_str()).unwrap_or("not started")
}

#[derive(Debug, Error)]
pub enum FlowError {
  #[error("problem {problem_id} is not active")]
  Inactive { problem_id: String },

  #[error(
    "problem {problem_id} is at stage {}, not {}",
    stage_label(.current),
    stage_label(.expected)
  )]
  StageMismatch {
    problem_id: String,
    expected: Option<Role>,
    current: Option<Role>,
  },

  #[error("stage {stage} of problem {problem_id} is not resolved")]
  StageUnresolved { problem_id: String, stage: Role },

  #[error("problem {problem_id} has no template bound to role {role}")]
  MissingRole { problem_id: String, role: Role },

  #[error("{flow} flow has no transition out of stage {stage}")]
  UnexpectedStage { flow: FlowKind, stage: Role },

  #[error("{flow} flow does not collect ratings")]
  NoRatings { flow: FlowKind },

  #[error("store error: {0}")]
  Store(#[from] crowdforge_store::Error),

  #[error("posting failed: {0}")]
  Posting(#[from] PostingError),

  #[error("render failed: {0}")]
  Render(#[from] RenderError),
}
