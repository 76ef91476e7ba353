//! OS interrupt handling
//!
//! The first Ctrl-C flushes captured output, runs AfterSuite once and
//! reports a failed suite before exiting with status 1. A second Ctrl-C
//! while that is in progress exits immediately.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::warn;

use super::RunnerShared;
use crate::models::SuiteSummary;

const OUTPUT_HEADER: &str = "
Received interrupt.  Emitting contents of captured output...
------------------------------------------------------------
";

const AFTER_SUITE_NOTICE: &str = "
------------------------------------------------------------
Received interrupt.  Running AfterSuite...
^C again to terminate immediately
";

/// Cloneable handle onto a runner's interrupt path
#[derive(Clone)]
pub struct InterruptHandle {
    shared: Arc<RunnerShared>,
}

impl InterruptHandle {
    pub(crate) fn new(shared: Arc<RunnerShared>) -> Self {
        Self { shared }
    }

    pub fn is_interrupted(&self) -> bool {
        self.shared.was_interrupted()
    }

    /// Mark the suite interrupted and wind it down without exiting.
    ///
    /// A spec already running finishes on its own; `SpecRunner::run` then
    /// returns `false`. Returns the failed suite summary, or `None` if the
    /// suite had already been interrupted or had ended.
    pub async fn interrupt(&self) -> Option<SuiteSummary> {
        if !self.shared.mark_interrupted() {
            return None;
        }
        warn!(suite_id = %self.shared.suite_id, "Received interrupt");

        self.shared.capture().dump_out_with_header(OUTPUT_HEADER);
        if self.shared.has_after_suite() {
            eprint!("{AFTER_SUITE_NOTICE}");
            // the interrupted spec may still be using the suite's failer
            let env = self.shared.env.with_fresh_failer();
            self.shared.run_after_suite(&env).await;
        }
        let summary = self.shared.report_suite_end(false);
        self.shared.wound_down.send_replace(true);
        Some(summary)
    }
}

/// Spawn the Ctrl-C listener for one run
pub(crate) fn listen(handle: InterruptHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Unable to listen for interrupts: {}", err);
            return;
        }

        let hard_interrupt = tokio::spawn(async {
            if signal::ctrl_c().await.is_ok() {
                std::process::exit(1);
            }
        });

        handle.shared.exit_on_interrupt.store(true, Ordering::SeqCst);
        handle.interrupt().await;
        hard_interrupt.abort();
        std::process::exit(1);
    })
}
