use crowdforge_flow::FlowError;
use crowdforge_marketplace::PollError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TickError {
  #[error("store error: {0}")]
  Store(#[from] crowdforge_store::Error),

  #[error(transparent)]
  Poll(#[from] PollError),

  #[error(transparent)]
  Flow(#[from] FlowError),
}
