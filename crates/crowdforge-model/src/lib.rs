//! CrowdForge Model
//!
//! This crate provides the resolved record types that flows operate on.
//! Where `crowdforge-config` references templates by name, the types here
//! carry generated identifiers and lifecycle state:
//! - [`TaskTemplate`]: a reusable kind of work unit
//! - [`Problem`]: one workflow execution, with templates bound to [`Role`]s
//! - [`TaskInstance`]: one concrete unit of work posted to the crowd
//! - [`TaskResult`]: one worker's submitted answer, append-only
//!
//! [`InstanceRecord`] pairs an instance with its results and is the unit
//! a flow reads when it decides how to move on.

mod error;
mod history;
mod problem;
mod resolve;
mod result;
mod role;
mod task;
mod template;

pub use crowdforge_config::FlowKind;
pub use error::ModelError;
pub use history::{InstanceRecord, is_stage_resolved, results_for, stage_records};
pub use problem::{Problem, ProblemStatus, RoleBindings};
pub use resolve::{Resolved, resolve};
pub use result::{ResultValue, TaskResult, value_text};
pub use role::Role;
pub use task::{Params, TaskInstance};
pub use template::TaskTemplate;

/// Generate a new record identifier.
pub fn new_id() -> String {
  uuid::Uuid::new_v4().to_string()
}
