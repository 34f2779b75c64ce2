//! CrowdForge Scheduler
//!
//! One [`Scheduler::tick`] walks every active task and every active problem:
//!
//! 1. For each active task, record unseen results, then resolve the task if
//!    the marketplace reports it expired or at capacity.
//! 2. For each active problem, start it if it has no stage yet, or advance
//!    it if its current stage has resolved.
//!
//! Failures are isolated per task and per problem and collected in the
//! [`TickReport`]. [`Scheduler::run`] repeats the tick on an interval until
//! cancelled.

mod error;
mod poll;
mod scheduler;

pub use error::TickError;
pub use poll::{fetch_new_results, is_complete, is_expired};
pub use scheduler::{Scheduler, TickFailure, TickReport};
