//! Node bodies and the context handed to them
//!
//! A body is either synchronous (runs to completion on the runner's thread)
//! or asynchronous (receives a [`Done`] signal and races it against a timer).
//! The variant is chosen once, at registration.

use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

use super::benchmarker::Benchmarker;
use crate::failer::{BodyResult, Failer, Halt};
use crate::models::CodeLocation;
use crate::writer::{OutputCapture, SpecWriter};

pub type SyncFn = dyn Fn(&NodeContext) -> BodyResult + Send + Sync;
pub type AsyncFn = dyn Fn(NodeContext, Done) -> BodyResult + Send + Sync;

/// Executable body of a hook or subject node
#[derive(Clone)]
pub enum Body {
    Sync(Arc<SyncFn>),
    Async {
        body: Arc<AsyncFn>,
        /// `None` falls back to the suite's configured spec timeout
        timeout: Option<Duration>,
    },
}

impl Body {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&NodeContext) -> BodyResult + Send + Sync + 'static,
    {
        Body::Sync(Arc::new(f))
    }

    /// Body that signals completion through [`Done::close`]
    pub fn with_done<F>(timeout: Option<Duration>, f: F) -> Self
    where
        F: Fn(NodeContext, Done) -> BodyResult + Send + Sync + 'static,
    {
        Body::Async {
            body: Arc::new(f),
            timeout,
        }
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Body::Async { .. })
    }

    pub fn timeout(&self) -> Option<Duration> {
        match self {
            Body::Sync(_) => None,
            Body::Async { timeout, .. } => *timeout,
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Sync(_) => f.write_str("Body::Sync"),
            Body::Async { timeout, .. } => f
                .debug_struct("Body::Async")
                .field("timeout", timeout)
                .finish(),
        }
    }
}

#[derive(Debug)]
pub(crate) enum Completion {
    Closed,
    Halted,
    Panicked { message: String, trace: String },
}

pub(crate) type CompletionSlot = Arc<Mutex<Option<oneshot::Sender<Completion>>>>;

/// Deliver a completion; only the first one reaches the runner
pub(crate) fn complete(slot: &CompletionSlot, completion: Completion) {
    let sender = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(sender) = sender {
        let _ = sender.send(completion);
    }
}

/// Completion signal for asynchronous bodies.
///
/// May be moved to another thread. Dropping it without calling
/// [`close`](Done::close) fails the node.
#[derive(Debug)]
pub struct Done {
    slot: CompletionSlot,
}

impl Done {
    pub(crate) fn new(slot: CompletionSlot) -> Self {
        Self { slot }
    }

    pub fn close(self) {
        complete(&self.slot, Completion::Closed);
    }
}

/// Handle passed to every node body.
///
/// Bound to one node run: once that run is over (including a body abandoned
/// after its timeout) `fail` and `skip` no longer record anything.
#[derive(Clone, Debug)]
pub struct NodeContext {
    failer: Arc<Failer>,
    generation: u64,
    capture: Arc<OutputCapture>,
    benchmarker: Option<Arc<Mutex<Benchmarker>>>,
}

impl NodeContext {
    pub(crate) fn new(
        failer: Arc<Failer>,
        generation: u64,
        capture: Arc<OutputCapture>,
        benchmarker: Option<Arc<Mutex<Benchmarker>>>,
    ) -> Self {
        Self {
            failer,
            generation,
            capture,
            benchmarker,
        }
    }

    /// Record a failure at the caller's location; return the `Halt` as `Err`
    #[track_caller]
    pub fn fail(&self, message: impl Into<String>) -> Halt {
        self.failer
            .fail_for(self.generation, message, CodeLocation::caller())
    }

    /// Mark the running spec skipped at the caller's location
    #[track_caller]
    pub fn skip(&self, message: impl Into<String>) -> Halt {
        self.failer
            .skip_for(self.generation, message, CodeLocation::caller())
    }

    /// `Err(fail(message))` unless `condition` holds
    #[track_caller]
    pub fn ensure(&self, condition: bool, message: impl Into<String>) -> BodyResult {
        if condition {
            Ok(())
        } else {
            Err(self.fail(message))
        }
    }

    /// Writer into the suite's capture buffer
    pub fn writer(&self) -> SpecWriter {
        SpecWriter::new(Arc::clone(&self.capture))
    }

    /// Convenience for a single line of captured output
    pub fn log(&self, line: impl AsRef<str>) {
        let _ = writeln!(self.writer(), "{}", line.as_ref());
    }

    /// Time `f`; inside a measure spec the duration is recorded under `name`
    pub fn time<T>(&self, name: &str, f: impl FnOnce() -> T) -> (T, Duration) {
        let start = Instant::now();
        let value = f();
        let elapsed = start.elapsed();
        if let Some(benchmarker) = &self.benchmarker {
            benchmarker
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .record_time(name, elapsed);
        }
        (value, elapsed)
    }

    /// Record an arbitrary sample value; ignored outside measure specs
    pub fn record_value(&self, name: &str, value: f64) {
        if let Some(benchmarker) = &self.benchmarker {
            benchmarker
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .record_value(name, value);
        }
    }
}
