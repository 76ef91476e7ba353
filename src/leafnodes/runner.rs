//! Leaf node execution
//!
//! Runs one hook or subject body and turns whatever happened into a
//! [`NodeOutcome`]. Synchronous bodies run on tokio's blocking pool with
//! panics caught, leaving the runtime free to poll the interrupt listener.
//! Asynchronous bodies run on their own thread and race their [`Done`]
//! signal against a timer; a body that loses the race is abandoned, not
//! killed.

use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::benchmarker::Benchmarker;
use super::body::{complete, AsyncFn, Body, Completion, CompletionSlot, Done, NodeContext, SyncFn};
use crate::failer::Failer;
use crate::models::{CodeLocation, FlagType, NodeType, SetupSummary, SpecFailure, SpecState};
use crate::writer::OutputCapture;

/// Suite-scoped resources every node run needs
#[derive(Clone, Debug)]
pub struct RunEnv {
    pub failer: Arc<Failer>,
    pub capture: Arc<OutputCapture>,
    /// Applied to async bodies registered without their own timeout
    pub default_timeout: Duration,
    pub emit_progress: bool,
}

impl RunEnv {
    pub fn new(capture: Arc<OutputCapture>, default_timeout: Duration) -> Self {
        Self {
            failer: Arc::new(Failer::new()),
            capture,
            default_timeout,
            emit_progress: false,
        }
    }

    pub fn with_progress(mut self, emit_progress: bool) -> Self {
        self.emit_progress = emit_progress;
        self
    }

    /// Same resources with a failer of its own
    pub(crate) fn with_fresh_failer(&self) -> Self {
        Self {
            failer: Arc::new(Failer::new()),
            ..self.clone()
        }
    }

    pub(crate) fn context(
        &self,
        generation: u64,
        benchmarker: Option<Arc<Mutex<Benchmarker>>>,
    ) -> NodeContext {
        NodeContext::new(
            Arc::clone(&self.failer),
            generation,
            Arc::clone(&self.capture),
            benchmarker,
        )
    }
}

/// Result of running one node once
#[derive(Clone, Debug, PartialEq)]
pub struct NodeOutcome {
    pub state: SpecState,
    pub failure: Option<SpecFailure>,
    pub run_time: Duration,
}

impl NodeOutcome {
    pub fn passed(&self) -> bool {
        self.state == SpecState::Passed
    }
}

/// A hook or subject: text, flag, location and body
#[derive(Clone, Debug)]
pub struct LeafNode {
    pub text: String,
    pub flag: FlagType,
    pub location: CodeLocation,
    pub node_type: NodeType,
    pub body: Body,
    /// Greater than one only for measure subjects
    pub samples: usize,
}

impl LeafNode {
    pub fn setup(node_type: NodeType, body: Body, location: CodeLocation) -> Self {
        Self {
            text: String::new(),
            flag: FlagType::None,
            location,
            node_type,
            body,
            samples: 1,
        }
    }

    pub fn subject(
        node_type: NodeType,
        text: impl Into<String>,
        flag: FlagType,
        body: Body,
        location: CodeLocation,
        samples: usize,
    ) -> Self {
        Self {
            text: text.into(),
            flag,
            location,
            node_type,
            body,
            samples,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.body.timeout()
    }

    pub fn is_measurement(&self) -> bool {
        self.node_type == NodeType::Measure
    }

    /// Run the body once under the suite's failer
    pub async fn run(
        &self,
        env: &RunEnv,
        component_index: usize,
        benchmarker: Option<Arc<Mutex<Benchmarker>>>,
    ) -> NodeOutcome {
        let generation = env.failer.begin_node();
        let ctx = env.context(generation, benchmarker);
        let start = Instant::now();

        match &self.body {
            Body::Sync(f) => run_sync(Arc::clone(f), ctx, &env.failer, &self.location).await,
            Body::Async { body, timeout } => {
                let timeout = timeout.unwrap_or(env.default_timeout);
                run_async(Arc::clone(body), ctx, &env.failer, timeout, &self.location).await
            }
        }

        let run_time = start.elapsed();
        let (state, failure) = env
            .failer
            .drain(self.node_type, component_index, &self.location);
        NodeOutcome {
            state,
            failure,
            run_time,
        }
    }
}

async fn run_sync(body: Arc<SyncFn>, ctx: NodeContext, failer: &Failer, location: &CodeLocation) {
    let joined = tokio::task::spawn_blocking(move || {
        panic::catch_unwind(AssertUnwindSafe(|| body(&ctx))).map_err(|payload| {
            (
                panic_message(payload.as_ref()),
                Backtrace::force_capture().to_string(),
            )
        })
    })
    .await;

    match joined {
        Ok(Ok(_)) => {}
        Ok(Err((message, trace))) => {
            failer.panic(location.clone().with_stack_trace(trace), message);
        }
        Err(err) => {
            let _ = failer.fail(format!("Sync node did not complete: {err}"), location.clone());
        }
    }
}

async fn run_async(
    body: Arc<AsyncFn>,
    ctx: NodeContext,
    failer: &Failer,
    timeout: Duration,
    location: &CodeLocation,
) {
    let (tx, rx) = oneshot::channel();
    let slot: CompletionSlot = Arc::new(Mutex::new(Some(tx)));
    let done = Done::new(Arc::clone(&slot));

    let spawned = thread::Builder::new()
        .name("spectree-async-node".to_string())
        .spawn(move || {
            match panic::catch_unwind(AssertUnwindSafe(|| body(ctx, done))) {
                // the body owns `done`; it may still close it from elsewhere
                Ok(Ok(())) => {}
                Ok(Err(_halt)) => complete(&slot, Completion::Halted),
                Err(payload) => complete(
                    &slot,
                    Completion::Panicked {
                        message: panic_message(payload.as_ref()),
                        trace: Backtrace::force_capture().to_string(),
                    },
                ),
            }
        });

    if let Err(err) = spawned {
        let _ = failer.fail(format!("Failed to start async node: {err}"), location.clone());
        return;
    }

    let completion = if timeout.is_zero() {
        Some(rx.await)
    } else {
        tokio::time::timeout(timeout, rx).await.ok()
    };

    match completion {
        None => {
            warn!("Async node at {} timed out after {:?}", location, timeout);
            failer.timeout(location.clone());
        }
        Some(Ok(Completion::Closed)) | Some(Ok(Completion::Halted)) => {}
        Some(Ok(Completion::Panicked { message, trace })) => {
            failer.panic(location.clone().with_stack_trace(trace), message);
        }
        Some(Err(_)) => {
            debug!("Done signal dropped at {}", location);
            let _ = failer.fail(
                "Async node finished without closing its Done signal",
                location.clone(),
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// BeforeSuite / AfterSuite node
#[derive(Clone, Debug)]
pub struct SuiteNode {
    node: LeafNode,
}

impl SuiteNode {
    pub fn new(node_type: NodeType, body: Body, location: CodeLocation) -> Self {
        Self {
            node: LeafNode::setup(node_type, body, location),
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.node.node_type
    }

    pub fn location(&self) -> &CodeLocation {
        &self.node.location
    }

    pub async fn run(&self, env: &RunEnv) -> NodeOutcome {
        self.node.run(env, 0, None).await
    }

    pub fn summary(&self, outcome: &NodeOutcome, suite_id: &str, captured: String) -> SetupSummary {
        SetupSummary {
            component_type: self.node.node_type,
            code_location: self.node.location.clone(),
            state: outcome.state,
            run_time: outcome.run_time,
            failure: outcome.failure.clone(),
            captured_output: captured,
            suite_id: suite_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn env() -> RunEnv {
        RunEnv::new(
            Arc::new(OutputCapture::new(false)),
            Duration::from_millis(200),
        )
    }

    fn it(body: Body) -> LeafNode {
        LeafNode::subject(
            NodeType::It,
            "does a thing",
            FlagType::None,
            body,
            CodeLocation::new("runner_test.rs", 1),
            1,
        )
    }

    #[tokio::test]
    async fn test_sync_pass() {
        let outcome = it(Body::sync(|_| Ok(()))).run(&env(), 1, None).await;
        assert_eq!(outcome.state, SpecState::Passed);
        assert!(outcome.failure.is_none());
    }

    #[tokio::test]
    async fn test_sync_fail_is_not_a_panic() {
        let node = it(Body::sync(|ctx| Err(ctx.fail("nope"))));
        let outcome = node.run(&env(), 3, None).await;
        assert_eq!(outcome.state, SpecState::Failed);
        let failure = outcome.failure.unwrap();
        assert_eq!(failure.message, "nope");
        assert_eq!(failure.component_index, 3);
        assert_eq!(failure.component_type, NodeType::It);
        assert!(failure.forwarded_panic.is_none());
    }

    #[tokio::test]
    async fn test_sync_skip() {
        let node = it(Body::sync(|ctx| Err(ctx.skip("not on this platform"))));
        let outcome = node.run(&env(), 1, None).await;
        assert_eq!(outcome.state, SpecState::Skipped);
    }

    #[tokio::test]
    async fn test_sync_panic_is_captured() {
        let node = it(Body::sync(|_| panic!("boom")));
        let outcome = node.run(&env(), 1, None).await;
        assert_eq!(outcome.state, SpecState::Panicked);
        let failure = outcome.failure.unwrap();
        assert_eq!(failure.forwarded_panic.as_deref(), Some("boom"));
        assert!(failure.location.full_stack_trace.is_some());
    }

    #[tokio::test]
    async fn test_panic_after_fail_keeps_failure() {
        let node = it(Body::sync(|ctx| {
            let _ = ctx.fail("expected 1 got 2");
            panic!("unwinding after failure");
        }));
        let outcome = node.run(&env(), 1, None).await;
        assert_eq!(outcome.state, SpecState::Failed);
        assert_eq!(outcome.failure.unwrap().message, "expected 1 got 2");
    }

    #[tokio::test]
    async fn test_async_completes_from_other_thread() {
        let node = it(Body::with_done(Some(Duration::from_secs(2)), |_, done| {
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(10));
                done.close();
            });
            Ok(())
        }));
        let outcome = node.run(&env(), 1, None).await;
        assert_eq!(outcome.state, SpecState::Passed);
    }

    #[tokio::test]
    async fn test_async_timeout_abandons_body() {
        let finished = Arc::new(AtomicUsize::new(0));
        let seen = finished.clone();
        let node = it(Body::with_done(Some(Duration::from_millis(20)), move |_, done| {
            std::thread::sleep(Duration::from_millis(150));
            seen.fetch_add(1, Ordering::SeqCst);
            done.close();
            Ok(())
        }));
        let outcome = node.run(&env(), 1, None).await;
        assert_eq!(outcome.state, SpecState::TimedOut);
        assert!(outcome.run_time < Duration::from_millis(150));
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_async_default_timeout_applies() {
        let node = it(Body::with_done(None, |_, done| {
            std::thread::sleep(Duration::from_millis(400));
            done.close();
            Ok(())
        }));
        let outcome = node.run(&env(), 1, None).await;
        assert_eq!(outcome.state, SpecState::TimedOut);
    }

    #[tokio::test]
    async fn test_async_fail_and_panic() {
        let failing = it(Body::with_done(None, |ctx, _done| Err(ctx.fail("bad reply"))));
        let outcome = failing.run(&env(), 1, None).await;
        assert_eq!(outcome.state, SpecState::Failed);

        let panicking = it(Body::with_done(None, |_, _done| panic!("async boom")));
        let outcome = panicking.run(&env(), 1, None).await;
        assert_eq!(outcome.state, SpecState::Panicked);
        assert_eq!(
            outcome.failure.unwrap().forwarded_panic.as_deref(),
            Some("async boom")
        );
    }

    #[tokio::test]
    async fn test_async_dropped_done_fails() {
        let node = it(Body::with_done(Some(Duration::from_secs(5)), |_, done| {
            drop(done);
            Ok(())
        }));
        let outcome = node.run(&env(), 1, None).await;
        assert_eq!(outcome.state, SpecState::Failed);
    }

    #[tokio::test]
    async fn test_abandoned_body_cannot_fail_next_node() {
        let env = env();
        let slow = it(Body::with_done(Some(Duration::from_millis(20)), |ctx, done| {
            std::thread::sleep(Duration::from_millis(80));
            let _ = ctx.fail("late failure from abandoned body");
            done.close();
            Ok(())
        }));
        let innocent = it(Body::with_done(Some(Duration::from_secs(2)), |_, done| {
            std::thread::sleep(Duration::from_millis(200));
            done.close();
            Ok(())
        }));

        let outcome = slow.run(&env, 1, None).await;
        assert_eq!(outcome.state, SpecState::TimedOut);

        let outcome = innocent.run(&env, 1, None).await;
        assert_eq!(outcome.state, SpecState::Passed);
        assert!(outcome.failure.is_none());
    }

    #[tokio::test]
    async fn test_sync_body_leaves_runtime_free() {
        let ticked = Arc::new(AtomicUsize::new(0));
        let ticker = ticked.clone();
        tokio::spawn(async move {
            ticker.fetch_add(1, Ordering::SeqCst);
        });

        let seen = ticked.clone();
        let node = it(Body::sync(move |ctx| {
            let deadline = Instant::now() + Duration::from_secs(1);
            while seen.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(5));
            }
            ctx.ensure(seen.load(Ordering::SeqCst) == 1, "spawned task never ran")
        }));
        let outcome = node.run(&env(), 1, None).await;
        assert_eq!(outcome.state, SpecState::Passed);
    }

    #[test]
    fn test_suite_node_summary() {
        let node = SuiteNode::new(
            NodeType::BeforeSuite,
            Body::sync(|ctx| Err(ctx.fail("db unavailable"))),
            CodeLocation::new("suite.rs", 8),
        );
        let outcome = tokio_test::block_on(node.run(&env()));
        let summary = node.summary(&outcome, "suite-1", "log".to_string());
        assert_eq!(summary.component_type, NodeType::BeforeSuite);
        assert_eq!(summary.state, SpecState::Failed);
        assert_eq!(summary.captured_output, "log");
        assert!(!summary.passed());
    }
}
