//! Flattened specs
//!
//! A [`Spec`] pairs one subject with its ancestor chain; [`Specs`] is the
//! ordered collection a run iterates over.

mod include;
#[allow(clippy::module_inception)]
mod spec;
mod specs;

pub use include::IncludeList;
pub use spec::Spec;
pub use specs::{ShuffleScope, Specs};
