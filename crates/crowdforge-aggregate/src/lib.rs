//! CrowdForge Aggregate
//!
//! Pure functions that combine worker-submitted results into inputs for the
//! next stage. Nothing here holds state: every aggregate can be recomputed
//! from the result set alone, so re-running a transition over the same
//! results yields the same output.
//!
//! - [`outline_parts`] / [`table_parts`]: the parts of a partition
//! - [`list_fragment`]: one field of every result as an ordered list fragment
//! - [`tally_ratings`] / [`top_rated`]: running-mean ratings per candidate

mod list;
mod outline;
mod rating;

pub use list::{collect_field, list_fragment};
pub use outline::{Part, outline_labels, outline_parts, table_parts};
pub use rating::{RatingTally, parse_rating, tally_ratings, top_rated};
