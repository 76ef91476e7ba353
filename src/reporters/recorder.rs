//! In-memory reporter used by runner and suite tests

use std::sync::{Mutex, PoisonError};

use super::Reporter;
use crate::config::SuiteConfig;
use crate::models::{SetupSummary, SpecSummary, SuiteSummary};

#[derive(Default)]
pub(crate) struct RecordingReporter {
    events: Mutex<Vec<String>>,
    completed: Mutex<Vec<SpecSummary>>,
    setups: Mutex<Vec<SetupSummary>>,
    ends: Mutex<Vec<SuiteSummary>>,
}

impl RecordingReporter {
    pub(crate) fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn completed(&self) -> Vec<SpecSummary> {
        self.completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Completion summary of the last attempt of the spec with this full text
    pub(crate) fn spec(&self, full_text: &str) -> Option<SpecSummary> {
        self.completed()
            .into_iter()
            .rev()
            .find(|summary| summary.full_text() == full_text)
    }

    pub(crate) fn setups(&self) -> Vec<SetupSummary> {
        self.setups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn suite_end(&self) -> Option<SuiteSummary> {
        self.ends
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    fn push(&self, event: String) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl Reporter for RecordingReporter {
    fn suite_will_begin(&self, _config: &SuiteConfig, _summary: &SuiteSummary) {
        self.push("SuiteWillBegin".to_string());
    }

    fn before_suite_did_run(&self, summary: &SetupSummary) {
        self.push(format!("BeforeSuiteDidRun:{}", summary.state));
        self.setups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(summary.clone());
    }

    fn spec_will_run(&self, summary: &SpecSummary) {
        self.push(format!("SpecWillRun:{}", summary.full_text()));
    }

    fn spec_did_complete(&self, summary: &SpecSummary) {
        self.push(format!(
            "SpecDidComplete:{}:{}",
            summary.full_text(),
            summary.state
        ));
        self.completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(summary.clone());
    }

    fn after_suite_did_run(&self, summary: &SetupSummary) {
        self.push(format!("AfterSuiteDidRun:{}", summary.state));
        self.setups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(summary.clone());
    }

    fn suite_did_end(&self, summary: &SuiteSummary) {
        self.push(format!("SuiteDidEnd:{}", summary.suite_succeeded));
        self.ends
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(summary.clone());
    }
}
