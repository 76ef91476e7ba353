//! Suite execution
//!
//! [`SpecRunner`] walks a resolved [`Specs`] sequence once: BeforeSuite,
//! every spec in order, AfterSuite, then the suite-end report. An interrupt
//! listener runs alongside and shares only the `interrupted` flag and the
//! AfterSuite node with the main loop.

mod interrupt;

pub use interrupt::InterruptHandle;

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::SuiteConfig;
use crate::leafnodes::{NodeOutcome, RunEnv, SuiteNode};
use crate::models::{SpecFailure, SpecState, SpecSummary, SuiteSummary};
use crate::reporters::ReporterSet;
use crate::spec::{Spec, Specs};
use crate::utils::{SuiteBudget, Timer};
use crate::writer::OutputCapture;

/// Where a run currently is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunnerState {
    NotStarted,
    BeforeSuiteRunning,
    SpecsRunning,
    AfterSuiteRunning,
    Ended,
    /// Reachable from any other state; never left once entered
    Interrupted,
}

/// Generate unique suite ID
pub fn generate_suite_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let random: u32 = rand::random::<u32>() % 10000;
    format!("{timestamp}_{random:04}")
}

/// Running counts behind the suite summary
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Tally {
    total: usize,
    will_run: usize,
    pending: usize,
    skipped: usize,
    passed: usize,
    failed: usize,
    flaked: usize,
    aborted: usize,
}

impl Tally {
    fn planned(specs: &[Spec]) -> Self {
        let mut tally = Self {
            total: specs.len(),
            ..Self::default()
        };
        for spec in specs {
            match spec.state() {
                SpecState::Pending => tally.pending += 1,
                SpecState::Skipped => tally.skipped += 1,
                _ => tally.will_run += 1,
            }
        }
        tally
    }

    /// Count the final state of a spec that was scheduled to run
    fn record(&mut self, spec: &Spec) {
        match spec.state() {
            SpecState::Passed => {
                self.passed += 1;
                if spec.flaked() {
                    self.flaked += 1;
                }
            }
            SpecState::Skipped => self.skipped += 1,
            SpecState::Aborted => self.aborted += 1,
            state if state.is_failure() => self.failed += 1,
            _ => {}
        }
    }
}

/// State reachable from both the main loop and the interrupt listener
pub(crate) struct RunnerShared {
    description: String,
    suite_id: String,
    started_at: DateTime<Utc>,
    timer: Timer,
    config: SuiteConfig,
    reporters: ReporterSet,
    env: RunEnv,
    after_suite: Option<SuiteNode>,
    after_suite_ran: AtomicBool,
    interrupted: Mutex<bool>,
    /// Set by the OS-signal listener, which exits the process when done
    exit_on_interrupt: AtomicBool,
    /// Flips to true once the interrupt path has reported suite-end
    wound_down: watch::Sender<bool>,
    state: Mutex<RunnerState>,
    tally: Mutex<Tally>,
}

impl RunnerShared {
    fn was_interrupted(&self) -> bool {
        *self
            .interrupted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns false if the suite had already been interrupted or has ended
    fn mark_interrupted(&self) -> bool {
        let mut interrupted = self
            .interrupted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *interrupted || *state == RunnerState::Ended {
            return false;
        }
        *interrupted = true;
        *state = RunnerState::Interrupted;
        true
    }

    /// Move to `Ended` unless an interrupt got there first
    fn finish(&self) -> bool {
        let interrupted = self
            .interrupted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *interrupted {
            return false;
        }
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = RunnerState::Ended;
        true
    }

    /// Wait for the interrupt path to report suite-end.
    ///
    /// On the OS-signal path the process exits from the listener, so this
    /// never returns.
    async fn wait_for_wind_down(&self) {
        if self.exit_on_interrupt.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let mut wound_down = self.wound_down.subscribe();
        let _ = wound_down.wait_for(|done| *done).await;
    }

    fn state(&self) -> RunnerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: RunnerState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != RunnerState::Interrupted {
            *state = next;
        }
    }

    fn record(&self, spec: &Spec) {
        self.tally
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(spec);
    }

    fn summary(&self, succeeded: bool) -> SuiteSummary {
        let tally = *self.tally.lock().unwrap_or_else(PoisonError::into_inner);
        SuiteSummary {
            suite_description: self.description.clone(),
            suite_succeeded: succeeded,
            suite_id: self.suite_id.clone(),
            started_at: self.started_at,
            number_of_specs_before_parallelization: tally.total,
            number_of_total_specs: tally.total,
            number_of_specs_that_will_be_run: tally.will_run,
            number_of_pending_specs: tally.pending,
            number_of_skipped_specs: tally.skipped,
            number_of_passed_specs: tally.passed,
            number_of_failed_specs: tally.failed,
            number_of_flaked_specs: tally.flaked,
            number_of_aborted_specs: tally.aborted,
            run_time: self.timer.elapsed(),
        }
    }

    fn capture(&self) -> &OutputCapture {
        &self.env.capture
    }

    fn has_after_suite(&self) -> bool {
        self.after_suite.is_some()
    }

    fn report_suite_end(&self, succeeded: bool) -> SuiteSummary {
        let summary = self.summary(succeeded);
        self.reporters.suite_did_end(&summary);
        summary
    }

    /// Report a spec's current summary as will-run/did-complete
    fn report_spec(&self, spec: &Spec, announce: bool) {
        let mut summary = spec.summary(&self.suite_id);
        if announce {
            self.reporters.spec_will_run(&summary);
        }
        if summary.captured_output.is_empty() {
            summary.captured_output = self.capture().captured();
        }
        let failed = spec.failed();
        self.reporters.spec_did_complete(&summary, || {
            if failed {
                self.capture().dump_out();
            }
        });
    }

    fn report_without_running(&self, spec: &Spec) {
        self.capture().truncate();
        self.report_spec(spec, true);
    }

    /// Run one spec, retrying failures up to the configured attempts.
    /// Every attempt is reported.
    async fn run_spec(&self, spec: &mut Spec) -> bool {
        let attempts = self.config.max_attempts();
        for attempt in 1..=attempts {
            self.capture().truncate();
            self.reporters.spec_will_run(&spec.summary(&self.suite_id));
            if attempt > 1 {
                debug!(
                    "Retrying {} (attempt {}/{})",
                    spec.concatenated_string(),
                    attempt,
                    attempts
                );
            }
            spec.run(&self.env).await;
            self.report_spec(spec, false);
            if !spec.failed() {
                break;
            }
        }
        self.record(spec);
        !spec.failed()
    }

    /// Run AfterSuite at most once across the main loop and the interrupt path
    async fn run_after_suite(&self, env: &RunEnv) -> bool {
        let Some(node) = &self.after_suite else {
            return true;
        };
        if self.after_suite_ran.swap(true, Ordering::SeqCst) {
            return true;
        }

        self.set_state(RunnerState::AfterSuiteRunning);
        self.capture().truncate();
        let outcome = node.run(env).await;
        let passed = outcome.passed();
        let summary = node.summary(&outcome, &self.suite_id, self.capture().captured());
        self.reporters.after_suite_did_run(&summary, || {
            if !passed {
                self.capture().dump_out();
            }
        });
        passed
    }
}

/// Suite nodes in a dry run report as passed without executing
fn dry_run_outcome() -> NodeOutcome {
    NodeOutcome {
        state: SpecState::Passed,
        failure: None,
        run_time: Duration::ZERO,
    }
}

/// Runs a resolved spec sequence once
pub struct SpecRunner {
    shared: Arc<RunnerShared>,
    specs: Specs,
    before_suite: Option<SuiteNode>,
}

impl SpecRunner {
    pub fn new(
        description: impl Into<String>,
        before_suite: Option<SuiteNode>,
        specs: Specs,
        after_suite: Option<SuiteNode>,
        reporters: ReporterSet,
        config: SuiteConfig,
    ) -> Self {
        let capture = Arc::new(OutputCapture::new(config.stream_output));
        let env = RunEnv::new(capture, config.spec_timeout()).with_progress(config.emit_spec_progress);
        let tally = Tally::planned(specs.specs());
        let shared = RunnerShared {
            description: description.into(),
            suite_id: generate_suite_id(),
            started_at: Utc::now(),
            timer: Timer::start("suite"),
            config,
            reporters,
            env,
            after_suite,
            after_suite_ran: AtomicBool::new(false),
            interrupted: Mutex::new(false),
            exit_on_interrupt: AtomicBool::new(false),
            wound_down: watch::Sender::new(false),
            state: Mutex::new(RunnerState::NotStarted),
            tally: Mutex::new(tally),
        };

        Self {
            shared: Arc::new(shared),
            specs,
            before_suite,
        }
    }

    pub fn suite_id(&self) -> &str {
        &self.shared.suite_id
    }

    pub fn state(&self) -> RunnerState {
        self.shared.state()
    }

    pub fn specs(&self) -> &Specs {
        &self.specs
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle::new(Arc::clone(&self.shared))
    }

    /// Current suite summary
    pub fn summary(&self, succeeded: bool) -> SuiteSummary {
        self.shared.summary(succeeded)
    }

    /// Summaries of every spec in run order
    pub fn spec_summaries(&self) -> Vec<SpecSummary> {
        self.specs
            .specs()
            .iter()
            .map(|spec| spec.summary(&self.shared.suite_id))
            .collect()
    }

    /// Execute the suite and return whether it succeeded.
    ///
    /// After an OS interrupt this never returns; the listener finishes the
    /// run and exits the process. After [`InterruptHandle::interrupt`] it
    /// stops between specs and returns `false` once the wind-down is done.
    pub async fn run(&mut self) -> bool {
        if self.shared.config.dry_run {
            return self.perform_dry_run();
        }

        let shared = Arc::clone(&self.shared);
        let budget = SuiteBudget::new(shared.config.suite_timeout());
        info!(
            suite = %shared.description,
            suite_id = %shared.suite_id,
            "Running {} specs",
            self.specs.len()
        );
        shared
            .reporters
            .suite_will_begin(&shared.config, &shared.summary(false));
        let listener = interrupt::listen(self.interrupt_handle());

        let mut succeeded = match self.run_before_suite().await {
            Some(outcome) if !outcome.passed() => {
                self.fail_runnable_specs(outcome.failure);
                false
            }
            _ => self.run_specs(&budget).await,
        };

        if !shared.was_interrupted() {
            succeeded = shared.run_after_suite(&shared.env).await && succeeded;
        }
        if !shared.finish() {
            shared.wait_for_wind_down().await;
            listener.abort();
            return false;
        }

        let summary = shared.report_suite_end(succeeded);
        listener.abort();
        info!("{}", summary);
        succeeded
    }

    fn perform_dry_run(&mut self) -> bool {
        let shared = Arc::clone(&self.shared);
        shared
            .reporters
            .suite_will_begin(&shared.config, &shared.summary(false));
        if let Some(node) = &self.before_suite {
            let summary = node.summary(&dry_run_outcome(), &shared.suite_id, String::new());
            shared.reporters.before_suite_did_run(&summary, || {});
        }
        shared.set_state(RunnerState::SpecsRunning);
        for spec in self.specs.specs_mut() {
            let scheduled = !spec.pending() && !spec.skipped();
            spec.mark_passed_without_running();
            if scheduled {
                shared.record(spec);
            }
            shared.report_without_running(spec);
        }
        if let Some(node) = &shared.after_suite {
            let summary = node.summary(&dry_run_outcome(), &shared.suite_id, String::new());
            shared.reporters.after_suite_did_run(&summary, || {});
        }
        shared.set_state(RunnerState::Ended);
        shared.report_suite_end(true);
        true
    }

    async fn run_before_suite(&self) -> Option<NodeOutcome> {
        let node = self.before_suite.as_ref()?;
        if self.shared.was_interrupted() {
            return None;
        }

        self.shared.set_state(RunnerState::BeforeSuiteRunning);
        self.shared.capture().truncate();
        let outcome = node.run(&self.shared.env).await;
        let passed = outcome.passed();
        let summary = node.summary(
            &outcome,
            &self.shared.suite_id,
            self.shared.capture().captured(),
        );
        self.shared.reporters.before_suite_did_run(&summary, || {
            if !passed {
                self.shared.capture().dump_out();
            }
        });
        Some(outcome)
    }

    /// BeforeSuite failed: every spec that would have run fails unexecuted
    fn fail_runnable_specs(&mut self, failure: Option<SpecFailure>) {
        warn!("BeforeSuite failed, no specs will run");
        for spec in self.specs.specs_mut() {
            if spec.pending() || spec.skipped() {
                continue;
            }
            spec.fail_without_running(failure.clone());
            self.shared.record(spec);
        }
    }

    async fn run_specs(&mut self, budget: &SuiteBudget) -> bool {
        let shared = Arc::clone(&self.shared);
        shared.set_state(RunnerState::SpecsRunning);

        let mut succeeded = true;
        let mut abort = false;
        for spec in self.specs.specs_mut() {
            if shared.was_interrupted() {
                return succeeded;
            }
            if !abort && budget.exhausted() {
                warn!(
                    "Suite timeout elapsed after {:?}, aborting remaining specs",
                    budget.elapsed()
                );
                abort = true;
            }

            let scheduled = !spec.pending() && !spec.skipped();
            if scheduled && abort {
                spec.abort();
                shared.record(spec);
                shared.report_without_running(spec);
                succeeded = false;
            } else if scheduled {
                if !shared.run_spec(spec).await {
                    succeeded = false;
                }
            } else {
                if spec.pending() && shared.config.fail_on_pending {
                    succeeded = false;
                }
                shared.report_without_running(spec);
            }

            if spec.failed() && shared.config.fail_fast && !abort {
                info!("Fail-fast: aborting remaining specs");
                abort = true;
            }
        }
        succeeded
    }
}
