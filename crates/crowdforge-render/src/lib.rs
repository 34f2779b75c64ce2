//! CrowdForge Render
//!
//! The presentation layer for generated worker-facing content. Flows hand
//! this crate structured data and get markup back, so the transition logic
//! itself carries no HTML.
//!
//! - [`render_task`] resolves a template's `title`, `description` and `body`
//!   against an instance's parameters using minijinja.
//! - [`render_candidates`] renders candidate partitions, optionally with the
//!   fixed 5-point rating scale.
//! - [`list_items`] renders an ordered fragment of `<li>` items.
//!
//! Candidate order is shuffled per presentation with [`shuffled`] and is
//! never persisted.

mod candidate;
mod error;
mod task;

pub use candidate::{
  Candidate, CandidateStyle, RATING_SCALE, list_items, render_candidates, shuffled,
};
pub use error::RenderError;
pub use task::{RenderedTask, render_task};
