use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
  #[error("unknown role: {0}")]
  UnknownRole(String),

  #[error("unknown problem status: {0}")]
  UnknownStatus(String),

  #[error("invalid definitions: {0}")]
  Config(#[from] crowdforge_config::ConfigError),
}
