//! CrowdForge Marketplace
//!
//! Ports to the crowd-labor marketplace. The engine posts task instances
//! through [`TaskPoster`]; the scheduler reads submissions through
//! [`ResultPoller`] and lifecycle through [`StatusQuery`].
//!
//! [`SimulatedMarketplace`] implements all three in memory.

mod error;
mod simulated;
mod types;

pub use error::{PollError, PostingError};
pub use simulated::{PostedTask, SimulatedMarketplace};
pub use types::{Assignment, TaskStatus, posting_keywords};

use async_trait::async_trait;
use crowdforge_model::{TaskInstance, TaskTemplate};

/// Publishes task instances to the marketplace.
#[async_trait]
pub trait TaskPoster: Send + Sync {
  /// Post a rendered task instance. Returns the marketplace's id for it.
  async fn post(&self, template: &TaskTemplate, task: &TaskInstance)
  -> Result<String, PostingError>;
}

/// Reads worker submissions for a posted task.
#[async_trait]
pub trait ResultPoller: Send + Sync {
  /// Every assignment submitted so far, including ones already seen.
  async fn fetch_assignments(&self, external_id: &str) -> Result<Vec<Assignment>, PollError>;
}

/// Reads the lifecycle of a posted task.
#[async_trait]
pub trait StatusQuery: Send + Sync {
  async fn status(&self, external_id: &str) -> Result<TaskStatus, PollError>;
}

/// A marketplace the scheduler can drive end to end.
pub trait Marketplace: TaskPoster + ResultPoller + StatusQuery {}

impl<T: TaskPoster + ResultPoller + StatusQuery> Marketplace for T {}
