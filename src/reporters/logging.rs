//! Reporter that forwards lifecycle events to `tracing`

use tracing::{debug, error, info, warn};

use super::Reporter;
use crate::config::SuiteConfig;
use crate::models::{SetupSummary, SpecSummary, SuiteSummary};

#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Reporter for LoggingReporter {
    fn suite_will_begin(&self, config: &SuiteConfig, summary: &SuiteSummary) {
        info!(
            suite = %summary.suite_description,
            suite_id = %summary.suite_id,
            seed = config.random_seed,
            "Running {} of {} specs",
            summary.number_of_specs_that_will_be_run,
            summary.number_of_total_specs
        );
    }

    fn before_suite_did_run(&self, summary: &SetupSummary) {
        if summary.passed() {
            debug!("BeforeSuite passed in {:?}", summary.run_time);
        } else if let Some(failure) = &summary.failure {
            error!("BeforeSuite {}: {}", summary.state, failure);
        }
    }

    fn spec_will_run(&self, summary: &SpecSummary) {
        debug!("Starting {}", summary.full_text());
    }

    fn spec_did_complete(&self, summary: &SpecSummary) {
        if summary.failed() {
            warn!("{}", summary);
        } else {
            debug!("{}", summary);
        }
    }

    fn after_suite_did_run(&self, summary: &SetupSummary) {
        if let Some(failure) = &summary.failure {
            error!("AfterSuite {}: {}", summary.state, failure);
        }
    }

    fn suite_did_end(&self, summary: &SuiteSummary) {
        if summary.suite_succeeded {
            info!("{}", summary);
        } else {
            error!("{}", summary);
        }
    }
}
