//! spectree - hierarchical spec organization and execution
//!
//! Specs are declared as a tree of containers (`describe`/`context`) holding
//! setup hooks and subjects (`it`/`measure`). A run flattens the tree into
//! specs, resolves focus and skip selection, optionally shuffles, and then
//! executes each spec sequentially with its hook chain, reporting every
//! lifecycle event to the configured reporters.
//!
//! ## Features
//!
//! - Programmatic focus (`fit`, `fdescribe`) and pending (`pit`, `xdescribe`)
//! - Regex focus/skip and include-list selection
//! - Seeded top-level or full shuffling
//! - Synchronous and completion-signal bodies with per-node timeouts
//! - Suite time budget, fail-fast and flake attempts
//! - Measure specs with sampled timings and values
//! - Captured spec output, dumped on failure
//! - Interrupt handling that still runs AfterSuite

pub mod cli;
pub mod config;
pub mod containernode;
pub mod error;
pub mod failer;
pub mod leafnodes;
pub mod models;
pub mod reporters;
pub mod spec;
pub mod specrunner;
pub mod suite;
pub mod utils;
pub mod writer;

pub use config::SuiteConfig;
pub use error::SuiteError;
pub use failer::{BodyResult, Halt};
pub use leafnodes::{Body, Done, NodeContext};
pub use models::{
    CodeLocation, FlagType, NodeType, SetupSummary, SpecFailure, SpecState, SpecSummary,
    SuiteSummary,
};
pub use reporters::{LoggingReporter, Reporter};
pub use suite::{RunOutcome, Suite, EXIT_PASSED_WITH_FOCUS};
