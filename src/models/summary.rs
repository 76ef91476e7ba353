//! Summary snapshots handed to reporters
//!
//! Defines failures, per-spec and per-suite-node summaries, measurements
//! and the aggregated suite summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use super::types::{CodeLocation, NodeType, SpecState};

/// Details of the first failure recorded for a node
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpecFailure {
    pub message: String,
    pub location: CodeLocation,
    pub forwarded_panic: Option<String>,
    /// Position in the spec's component chain the failing node belongs to
    pub component_index: usize,
    pub component_type: NodeType,
    pub component_code_location: CodeLocation,
}

impl fmt::Display for SpecFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({})",
            self.component_type, self.message, self.location
        )?;
        if let Some(panic) = &self.forwarded_panic {
            write!(f, " - panic: {panic}")?;
        }
        Ok(())
    }
}

/// Aggregated results of one named measurement within a measure spec
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    /// Declaration order within the spec
    pub order: usize,
    pub units: String,
    pub results: Vec<f64>,
    pub smallest: f64,
    pub largest: f64,
    pub average: f64,
    pub std_deviation: f64,
}

/// Snapshot of a spec at a reporting point
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpecSummary {
    pub component_texts: Vec<String>,
    pub component_code_locations: Vec<CodeLocation>,
    pub state: SpecState,
    pub run_time: Duration,
    pub failure: Option<SpecFailure>,
    pub is_measurement: bool,
    pub number_of_samples: usize,
    pub measurements: BTreeMap<String, Measurement>,
    pub captured_output: String,
    pub suite_id: String,
    /// Excluded by focus/skip filtering (may sit underneath Pending)
    pub filtered_out: bool,
    pub flaked: bool,
}

impl SpecSummary {
    /// Container texts (without the synthetic root) and subject text joined
    pub fn full_text(&self) -> String {
        self.component_texts
            .iter()
            .skip(1)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn passed(&self) -> bool {
        self.state == SpecState::Passed
    }

    pub fn failed(&self) -> bool {
        self.state.is_failure()
    }
}

impl fmt::Display for SpecSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms]",
            self.state.symbol(),
            self.full_text(),
            self.run_time.as_millis()
        )?;
        if let Some(failure) = &self.failure {
            write!(f, " - {failure}")?;
        }
        Ok(())
    }
}

/// Snapshot of a BeforeSuite or AfterSuite node after it ran
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SetupSummary {
    pub component_type: NodeType,
    pub code_location: CodeLocation,
    pub state: SpecState,
    pub run_time: Duration,
    pub failure: Option<SpecFailure>,
    pub captured_output: String,
    pub suite_id: String,
}

impl SetupSummary {
    pub fn passed(&self) -> bool {
        self.state == SpecState::Passed
    }
}

/// Aggregated suite summary
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub suite_description: String,
    pub suite_succeeded: bool,
    pub suite_id: String,
    pub started_at: DateTime<Utc>,
    pub number_of_specs_before_parallelization: usize,
    pub number_of_total_specs: usize,
    pub number_of_specs_that_will_be_run: usize,
    pub number_of_pending_specs: usize,
    pub number_of_skipped_specs: usize,
    pub number_of_passed_specs: usize,
    pub number_of_failed_specs: usize,
    pub number_of_flaked_specs: usize,
    pub number_of_aborted_specs: usize,
    pub run_time: Duration,
}

impl SuiteSummary {
    pub fn pass_rate(&self) -> f64 {
        if self.number_of_specs_that_will_be_run == 0 {
            0.0
        } else {
            (self.number_of_passed_specs as f64 / self.number_of_specs_that_will_be_run as f64)
                * 100.0
        }
    }
}

impl fmt::Display for SuiteSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} - {}",
            self.suite_description,
            if self.suite_succeeded { "SUCCESS" } else { "FAIL" }
        )?;
        writeln!(
            f,
            "Ran {} of {} specs in {:.3}s",
            self.number_of_specs_that_will_be_run,
            self.number_of_total_specs,
            self.run_time.as_secs_f64()
        )?;
        write!(
            f,
            "Passed: {} | Failed: {} | Pending: {} | Skipped: {} | Aborted: {} | Flaked: {}",
            self.number_of_passed_specs,
            self.number_of_failed_specs,
            self.number_of_pending_specs,
            self.number_of_skipped_specs,
            self.number_of_aborted_specs,
            self.number_of_flaked_specs
        )
    }
}
