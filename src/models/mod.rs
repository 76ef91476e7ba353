//! Data models for spec execution
//!
//! This module contains the states, locations and summary snapshots shared
//! by the tree, the runner and reporters.

mod summary;
mod types;

pub use summary::{Measurement, SetupSummary, SpecFailure, SpecSummary, SuiteSummary};
pub use types::{CodeLocation, FlagType, NodeType, SpecState};
