//! CrowdForge Config
//!
//! This crate contains the serializable definition types for CrowdForge.
//! These types describe task templates and problems before they are resolved
//! into stored records and handed to a flow.
//!
//! Definitions are loaded from:
//! - JSON files (via the CLI with `crowdforge load defs.json`)
//! - Scenario files for `crowdforge simulate`
//!
//! Templates are referenced from problems by name. Resolution into records
//! with generated identifiers happens in `crowdforge-model`.

mod error;
mod flow;
mod forge;
mod problem;
mod template;

pub use error::ConfigError;
pub use flow::FlowKind;
pub use forge::ForgeDef;
pub use problem::ProblemDef;
pub use template::TaskTemplateDef;
