//! Leaf nodes: hooks and subjects
//!
//! Bodies, the context they receive, measurement collection and the runner
//! that applies timeout and panic policy to a single node.

mod benchmarker;
mod body;
mod runner;

pub use benchmarker::Benchmarker;
pub use body::{AsyncFn, Body, Done, NodeContext, SyncFn};
pub use runner::{LeafNode, NodeOutcome, RunEnv, SuiteNode};
