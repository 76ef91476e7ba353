//! Reporter contract
//!
//! Reporters receive immutable summary snapshots at each lifecycle point.
//! "Will" events go to reporters in registration order. "Did" events go to
//! every reporter except the first in reverse order, then to the first one
//! last, so the primary reporter always sees a completed event after the
//! others have handled it.

mod logging;
#[cfg(test)]
pub(crate) mod recorder;

pub use logging::LoggingReporter;

use std::sync::Arc;

use crate::config::SuiteConfig;
use crate::models::{SetupSummary, SpecSummary, SuiteSummary};

/// Lifecycle sink; every method defaults to a no-op
pub trait Reporter: Send + Sync {
    fn suite_will_begin(&self, _config: &SuiteConfig, _summary: &SuiteSummary) {}
    fn before_suite_did_run(&self, _summary: &SetupSummary) {}
    fn spec_will_run(&self, _summary: &SpecSummary) {}
    fn spec_did_complete(&self, _summary: &SpecSummary) {}
    fn after_suite_did_run(&self, _summary: &SetupSummary) {}
    fn suite_did_end(&self, _summary: &SuiteSummary) {}
}

/// Ordered reporters with the delivery order described above
#[derive(Clone, Default)]
pub struct ReporterSet {
    reporters: Vec<Arc<dyn Reporter>>,
}

impl ReporterSet {
    pub fn new(reporters: Vec<Arc<dyn Reporter>>) -> Self {
        Self { reporters }
    }

    pub fn len(&self) -> usize {
        self.reporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }

    fn will(&self, event: impl Fn(&dyn Reporter)) {
        for reporter in &self.reporters {
            event(reporter.as_ref());
        }
    }

    /// Deliver a "did" event; `before_first` runs just before the first
    /// reporter is notified
    fn did(&self, event: impl Fn(&dyn Reporter), before_first: impl FnOnce()) {
        for reporter in self.reporters.iter().skip(1).rev() {
            event(reporter.as_ref());
        }
        before_first();
        if let Some(first) = self.reporters.first() {
            event(first.as_ref());
        }
    }

    pub fn suite_will_begin(&self, config: &SuiteConfig, summary: &SuiteSummary) {
        self.will(|r| r.suite_will_begin(config, summary));
    }

    pub fn spec_will_run(&self, summary: &SpecSummary) {
        self.will(|r| r.spec_will_run(summary));
    }

    pub fn before_suite_did_run(&self, summary: &SetupSummary, before_first: impl FnOnce()) {
        self.did(|r| r.before_suite_did_run(summary), before_first);
    }

    pub fn spec_did_complete(&self, summary: &SpecSummary, before_first: impl FnOnce()) {
        self.did(|r| r.spec_did_complete(summary), before_first);
    }

    pub fn after_suite_did_run(&self, summary: &SetupSummary, before_first: impl FnOnce()) {
        self.did(|r| r.after_suite_did_run(summary), before_first);
    }

    pub fn suite_did_end(&self, summary: &SuiteSummary) {
        self.did(|r| r.suite_did_end(summary), || {});
    }
}
