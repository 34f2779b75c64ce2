use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to parse definitions: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("duplicate template name: {0}")]
  DuplicateTemplate(String),

  #[error("duplicate problem name: {0}")]
  DuplicateProblem(String),

  #[error("problem '{problem}' references unknown template '{template}'")]
  UnknownTemplate { problem: String, template: String },

  #[error("problem '{problem}' uses flow '{flow}' which requires a '{role}' template")]
  MissingRole {
    problem: String,
    flow: String,
    role: &'static str,
  },

  #[error("problem '{problem}' uses flow '{flow}' which does not use a '{role}' template")]
  UnsupportedRole {
    problem: String,
    flow: String,
    role: &'static str,
  },

  #[error("template '{0}' must allow at least one assignment")]
  ZeroCapacity(String),
}
