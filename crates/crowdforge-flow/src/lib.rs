//! CrowdForge Flow
//!
//! The stage-transition engine. A problem moves through a fixed pipeline of
//! stages determined by its [`FlowKind`]:
//!
//! ```text
//! basic:                           partition -> mapper -> reducer -> end
//! verified_partition:              partition -> partition_verify -> mapper -> reducer -> end
//! partition_selection_experiment:  partition -> reducer (refine) -> mapper (vote) -> end
//! ```
//!
//! [`transition`] is the pure core: given a problem, the stage that just
//! resolved and the problem's history, it says which stage comes next and
//! which tasks to issue for it. [`FlowEngine`] wraps it with storage,
//! rendering, posting and notification.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use crowdforge_flow::FlowEngine;
//!
//! let engine = FlowEngine::new(Arc::new(store), Arc::new(marketplace));
//! engine.start(&problem_id).await?;
//!
//! // later, once every partition task is resolved
//! engine.on_stage_completed(&problem_id, Role::Partition).await?;
//! ```

mod engine;
mod error;
pub mod events;
mod ratings;
mod transition;

pub use crowdforge_model::FlowKind;
pub use engine::{FlowEngine, StageOutcome};
pub use error::FlowError;
pub use events::{ChannelNotifier, FlowEvent, FlowNotifier, NoopNotifier};
pub use ratings::{CandidateRating, Origin, candidate_ratings};
pub use transition::{
  FACT_FIELD, LIST_PARAM, PARTITIONS_PARAM, TaskRequest, Transition, initial_tasks, transition,
};
