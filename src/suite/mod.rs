//! Suite facade
//!
//! Owns the declared tree and exposes the registration surface. Declaring
//! is the first phase: container bodies run immediately and push nodes
//! into the arena. [`Suite::run`] is the second phase: it resolves focus,
//! shuffles, flattens the tree into specs and hands them to a
//! [`SpecRunner`].

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::SuiteConfig;
use crate::containernode::ContainerTree;
use crate::error::SuiteError;
use crate::failer::BodyResult;
use crate::leafnodes::{Body, Done, LeafNode, NodeContext, SuiteNode};
use crate::models::{CodeLocation, FlagType, NodeType, SpecSummary, SuiteSummary};
use crate::reporters::{Reporter, ReporterSet};
use crate::spec::{IncludeList, ShuffleScope, Spec, Specs};
use crate::specrunner::SpecRunner;

/// Exit status for a passing run that still had programmatic focus
pub const EXIT_PASSED_WITH_FOCUS: i32 = 197;

/// Result of [`Suite::run`]
#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub passed: bool,
    pub has_programmatic_focus: bool,
    pub summary: SuiteSummary,
    /// Final summary of every spec, in run order
    pub specs: Vec<SpecSummary>,
}

impl RunOutcome {
    /// 0 on success, 1 on failure, and [`EXIT_PASSED_WITH_FOCUS`] when the
    /// run passed but focus was left in the code
    pub fn exit_code(&self) -> i32 {
        match (self.passed, self.has_programmatic_focus) {
            (false, _) => 1,
            (true, true) => EXIT_PASSED_WITH_FOCUS,
            (true, false) => 0,
        }
    }
}

/// A declared suite
///
/// ```no_run
/// # async fn demo() -> Result<(), spectree::SuiteError> {
/// use spectree::{Suite, SuiteConfig};
///
/// let mut suite = Suite::new();
/// suite.describe("Cache", |s| {
///     s.before_each(|ctx| {
///         ctx.log("warming");
///         Ok(())
///     })?;
///     s.it("returns stored values", |ctx| ctx.ensure(2 + 2 == 4, "math"))?;
///     Ok(())
/// })?;
///
/// let outcome = suite.run("Storage", &SuiteConfig::default(), Vec::new()).await?;
/// std::process::exit(outcome.exit_code());
/// # }
/// ```
#[derive(Debug, Default)]
pub struct Suite {
    tree: ContainerTree,
    current: usize,
    before_suite: Option<SuiteNode>,
    after_suite: Option<SuiteNode>,
    running: bool,
}

impl Suite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tree(&self) -> &ContainerTree {
        &self.tree
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn ensure_declaring(&self, kind: &'static str, location: &CodeLocation) -> Result<(), SuiteError> {
        if self.running {
            return Err(SuiteError::DeclaredAfterRun {
                kind,
                location: location.clone(),
            });
        }
        Ok(())
    }

    // Containers

    /// Push a container under the current one and run `body` inside it
    pub fn push_container_node(
        &mut self,
        text: impl Into<String>,
        flag: FlagType,
        location: CodeLocation,
        body: impl FnOnce(&mut Suite) -> Result<(), SuiteError>,
    ) -> Result<(), SuiteError> {
        self.ensure_declaring("Container", &location)?;
        let id = self
            .tree
            .push_container(self.current, text, flag, location);

        let parent = std::mem::replace(&mut self.current, id);
        let result = body(self);
        self.current = parent;
        result
    }

    #[track_caller]
    pub fn describe(
        &mut self,
        text: impl Into<String>,
        body: impl FnOnce(&mut Suite) -> Result<(), SuiteError>,
    ) -> Result<(), SuiteError> {
        self.push_container_node(text, FlagType::None, CodeLocation::caller(), body)
    }

    #[track_caller]
    pub fn context(
        &mut self,
        text: impl Into<String>,
        body: impl FnOnce(&mut Suite) -> Result<(), SuiteError>,
    ) -> Result<(), SuiteError> {
        self.push_container_node(text, FlagType::None, CodeLocation::caller(), body)
    }

    #[track_caller]
    pub fn fdescribe(
        &mut self,
        text: impl Into<String>,
        body: impl FnOnce(&mut Suite) -> Result<(), SuiteError>,
    ) -> Result<(), SuiteError> {
        self.push_container_node(text, FlagType::Focused, CodeLocation::caller(), body)
    }

    #[track_caller]
    pub fn pdescribe(
        &mut self,
        text: impl Into<String>,
        body: impl FnOnce(&mut Suite) -> Result<(), SuiteError>,
    ) -> Result<(), SuiteError> {
        self.push_container_node(text, FlagType::Pending, CodeLocation::caller(), body)
    }

    #[track_caller]
    pub fn xdescribe(
        &mut self,
        text: impl Into<String>,
        body: impl FnOnce(&mut Suite) -> Result<(), SuiteError>,
    ) -> Result<(), SuiteError> {
        self.push_container_node(text, FlagType::Pending, CodeLocation::caller(), body)
    }

    // Subjects

    pub fn push_it_node(
        &mut self,
        text: impl Into<String>,
        flag: FlagType,
        body: Body,
        location: CodeLocation,
    ) -> Result<(), SuiteError> {
        self.ensure_declaring("It", &location)?;
        let node = LeafNode::subject(NodeType::It, text, flag, body, location, 1);
        self.tree.push_subject(self.current, node);
        Ok(())
    }

    pub fn push_measure_node(
        &mut self,
        text: impl Into<String>,
        flag: FlagType,
        body: Body,
        location: CodeLocation,
        samples: usize,
    ) -> Result<(), SuiteError> {
        self.ensure_declaring("Measure", &location)?;
        if samples == 0 {
            return Err(SuiteError::InvalidSampleCount(location));
        }
        let node = LeafNode::subject(NodeType::Measure, text, flag, body, location, samples);
        self.tree.push_subject(self.current, node);
        Ok(())
    }

    #[track_caller]
    pub fn it<F>(&mut self, text: impl Into<String>, body: F) -> Result<(), SuiteError>
    where
        F: Fn(&NodeContext) -> BodyResult + Send + Sync + 'static,
    {
        self.push_it_node(text, FlagType::None, Body::sync(body), CodeLocation::caller())
    }

    #[track_caller]
    pub fn specify<F>(&mut self, text: impl Into<String>, body: F) -> Result<(), SuiteError>
    where
        F: Fn(&NodeContext) -> BodyResult + Send + Sync + 'static,
    {
        self.push_it_node(text, FlagType::None, Body::sync(body), CodeLocation::caller())
    }

    #[track_caller]
    pub fn fit<F>(&mut self, text: impl Into<String>, body: F) -> Result<(), SuiteError>
    where
        F: Fn(&NodeContext) -> BodyResult + Send + Sync + 'static,
    {
        self.push_it_node(text, FlagType::Focused, Body::sync(body), CodeLocation::caller())
    }

    #[track_caller]
    pub fn pit<F>(&mut self, text: impl Into<String>, body: F) -> Result<(), SuiteError>
    where
        F: Fn(&NodeContext) -> BodyResult + Send + Sync + 'static,
    {
        self.push_it_node(text, FlagType::Pending, Body::sync(body), CodeLocation::caller())
    }

    #[track_caller]
    pub fn xit<F>(&mut self, text: impl Into<String>, body: F) -> Result<(), SuiteError>
    where
        F: Fn(&NodeContext) -> BodyResult + Send + Sync + 'static,
    {
        self.push_it_node(text, FlagType::Pending, Body::sync(body), CodeLocation::caller())
    }

    /// Subject that completes through `done`; `None` uses the configured
    /// spec timeout
    #[track_caller]
    pub fn it_async<F>(
        &mut self,
        text: impl Into<String>,
        timeout: Option<Duration>,
        body: F,
    ) -> Result<(), SuiteError>
    where
        F: Fn(NodeContext, Done) -> BodyResult + Send + Sync + 'static,
    {
        self.push_it_node(
            text,
            FlagType::None,
            Body::with_done(timeout, body),
            CodeLocation::caller(),
        )
    }

    #[track_caller]
    pub fn measure<F>(
        &mut self,
        text: impl Into<String>,
        samples: usize,
        body: F,
    ) -> Result<(), SuiteError>
    where
        F: Fn(&NodeContext) -> BodyResult + Send + Sync + 'static,
    {
        self.push_measure_node(text, FlagType::None, Body::sync(body), CodeLocation::caller(), samples)
    }

    #[track_caller]
    pub fn fmeasure<F>(
        &mut self,
        text: impl Into<String>,
        samples: usize,
        body: F,
    ) -> Result<(), SuiteError>
    where
        F: Fn(&NodeContext) -> BodyResult + Send + Sync + 'static,
    {
        self.push_measure_node(text, FlagType::Focused, Body::sync(body), CodeLocation::caller(), samples)
    }

    #[track_caller]
    pub fn pmeasure<F>(
        &mut self,
        text: impl Into<String>,
        samples: usize,
        body: F,
    ) -> Result<(), SuiteError>
    where
        F: Fn(&NodeContext) -> BodyResult + Send + Sync + 'static,
    {
        self.push_measure_node(text, FlagType::Pending, Body::sync(body), CodeLocation::caller(), samples)
    }

    // Setup hooks

    /// Attach a BeforeEach/JustBeforeEach/JustAfterEach/AfterEach hook to
    /// the current container
    pub fn push_setup_node(
        &mut self,
        node_type: NodeType,
        body: Body,
        location: CodeLocation,
    ) -> Result<(), SuiteError> {
        self.ensure_declaring(node_type.name(), &location)?;
        self.tree
            .push_setup(self.current, LeafNode::setup(node_type, body, location));
        Ok(())
    }

    #[track_caller]
    pub fn before_each<F>(&mut self, body: F) -> Result<(), SuiteError>
    where
        F: Fn(&NodeContext) -> BodyResult + Send + Sync + 'static,
    {
        self.push_setup_node(NodeType::BeforeEach, Body::sync(body), CodeLocation::caller())
    }

    #[track_caller]
    pub fn before_each_async<F>(&mut self, timeout: Option<Duration>, body: F) -> Result<(), SuiteError>
    where
        F: Fn(NodeContext, Done) -> BodyResult + Send + Sync + 'static,
    {
        self.push_setup_node(
            NodeType::BeforeEach,
            Body::with_done(timeout, body),
            CodeLocation::caller(),
        )
    }

    #[track_caller]
    pub fn just_before_each<F>(&mut self, body: F) -> Result<(), SuiteError>
    where
        F: Fn(&NodeContext) -> BodyResult + Send + Sync + 'static,
    {
        self.push_setup_node(NodeType::JustBeforeEach, Body::sync(body), CodeLocation::caller())
    }

    #[track_caller]
    pub fn just_after_each<F>(&mut self, body: F) -> Result<(), SuiteError>
    where
        F: Fn(&NodeContext) -> BodyResult + Send + Sync + 'static,
    {
        self.push_setup_node(NodeType::JustAfterEach, Body::sync(body), CodeLocation::caller())
    }

    #[track_caller]
    pub fn after_each<F>(&mut self, body: F) -> Result<(), SuiteError>
    where
        F: Fn(&NodeContext) -> BodyResult + Send + Sync + 'static,
    {
        self.push_setup_node(NodeType::AfterEach, Body::sync(body), CodeLocation::caller())
    }

    #[track_caller]
    pub fn after_each_async<F>(&mut self, timeout: Option<Duration>, body: F) -> Result<(), SuiteError>
    where
        F: Fn(NodeContext, Done) -> BodyResult + Send + Sync + 'static,
    {
        self.push_setup_node(
            NodeType::AfterEach,
            Body::with_done(timeout, body),
            CodeLocation::caller(),
        )
    }

    // Suite hooks

    pub fn set_before_suite_node(&mut self, body: Body, location: CodeLocation) -> Result<(), SuiteError> {
        self.ensure_declaring("BeforeSuite", &location)?;
        if self.before_suite.is_some() {
            return Err(SuiteError::DuplicateBeforeSuite(location));
        }
        self.before_suite = Some(SuiteNode::new(NodeType::BeforeSuite, body, location));
        Ok(())
    }

    pub fn set_after_suite_node(&mut self, body: Body, location: CodeLocation) -> Result<(), SuiteError> {
        self.ensure_declaring("AfterSuite", &location)?;
        if self.after_suite.is_some() {
            return Err(SuiteError::DuplicateAfterSuite(location));
        }
        self.after_suite = Some(SuiteNode::new(NodeType::AfterSuite, body, location));
        Ok(())
    }

    #[track_caller]
    pub fn before_suite<F>(&mut self, body: F) -> Result<(), SuiteError>
    where
        F: Fn(&NodeContext) -> BodyResult + Send + Sync + 'static,
    {
        self.set_before_suite_node(Body::sync(body), CodeLocation::caller())
    }

    #[track_caller]
    pub fn before_suite_async<F>(&mut self, timeout: Option<Duration>, body: F) -> Result<(), SuiteError>
    where
        F: Fn(NodeContext, Done) -> BodyResult + Send + Sync + 'static,
    {
        self.set_before_suite_node(Body::with_done(timeout, body), CodeLocation::caller())
    }

    #[track_caller]
    pub fn after_suite<F>(&mut self, body: F) -> Result<(), SuiteError>
    where
        F: Fn(&NodeContext) -> BodyResult + Send + Sync + 'static,
    {
        self.set_after_suite_node(Body::sync(body), CodeLocation::caller())
    }

    #[track_caller]
    pub fn after_suite_async<F>(&mut self, timeout: Option<Duration>, body: F) -> Result<(), SuiteError>
    where
        F: Fn(NodeContext, Done) -> BodyResult + Send + Sync + 'static,
    {
        self.set_after_suite_node(Body::with_done(timeout, body), CodeLocation::caller())
    }

    // Running

    /// Resolve the declared tree into an ordered, filtered spec sequence
    pub fn build_specs(&self, description: &str, config: &SuiteConfig) -> Result<Specs, SuiteError> {
        let mut tree = self.tree.clone();
        tree.shuffle(&mut StdRng::seed_from_u64(config.random_seed));
        tree.back_propagate_programmatic_focus();

        let tree = Arc::new(tree);
        let mut specs = Specs::new(
            tree.collate()
                .into_iter()
                .map(|collated| Spec::new(Arc::clone(&tree), collated))
                .collect(),
        )
        .with_regex_scans_file_path(config.regex_scans_file_path);

        if config.randomize_all_specs {
            specs.shuffle(&mut StdRng::seed_from_u64(config.random_seed), ShuffleScope::All);
        }

        specs.apply_focus(
            description,
            config.focus_string.as_deref(),
            config.skip_string.as_deref(),
        )?;

        if let Some(path) = &config.include_file {
            let list = IncludeList::load(path)?;
            debug!("Loaded {} include-list entries from {}", list.len(), path.display());
            specs.apply_include_list(&list);
        }

        if config.skip_measurements {
            specs.skip_measurements();
        }

        Ok(specs)
    }

    /// Run the suite once. Declaring anything afterwards is an error.
    ///
    /// A selection error (bad pattern, unreadable include file) leaves the
    /// suite unstarted so it can be run again with a corrected config.
    pub async fn run(
        &mut self,
        description: &str,
        config: &SuiteConfig,
        reporters: Vec<Arc<dyn Reporter>>,
    ) -> Result<RunOutcome, SuiteError> {
        if self.running {
            return Err(SuiteError::AlreadyRan);
        }

        info!("Random seed: {}", config.random_seed);
        let specs = self.build_specs(description, config)?;
        self.running = true;
        let has_programmatic_focus = specs.has_programmatic_focus();

        let mut runner = SpecRunner::new(
            description,
            self.before_suite.clone(),
            specs,
            self.after_suite.clone(),
            ReporterSet::new(reporters),
            config.clone(),
        );
        let passed = runner.run().await;

        Ok(RunOutcome {
            passed,
            has_programmatic_focus,
            summary: runner.summary(passed),
            specs: runner.spec_summaries(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SpecState;
    use crate::reporters::recorder::RecordingReporter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn bump(counter: &Arc<AtomicUsize>) -> impl Fn(&NodeContext) -> BodyResult + Send + Sync + 'static {
        let counter = counter.clone();
        move |_: &NodeContext| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn config() -> SuiteConfig {
        SuiteConfig::default().with_seed(42)
    }

    async fn run(suite: &mut Suite, config: SuiteConfig) -> (RunOutcome, Arc<RecordingReporter>) {
        let recorder = Arc::new(RecordingReporter::default());
        let outcome = suite
            .run("Scenarios", &config, vec![recorder.clone() as Arc<dyn Reporter>])
            .await
            .unwrap();
        (outcome, recorder)
    }

    fn state_of(outcome: &RunOutcome, full_text: &str) -> SpecState {
        outcome
            .specs
            .iter()
            .find(|spec| spec.full_text() == full_text)
            .map(|spec| spec.state)
            .unwrap_or(SpecState::Invalid)
    }

    #[tokio::test]
    async fn test_programmatic_focus_selects_only_focused() {
        let (a, b, c) = (counter(), counter(), counter());
        let mut suite = Suite::new();
        suite.it("A", bump(&a)).unwrap();
        suite.fit("B", bump(&b)).unwrap();
        suite.it("C", bump(&c)).unwrap();

        let cfg = SuiteConfig {
            focus_string: Some(String::new()),
            ..config()
        };
        let (outcome, recorder) = run(&mut suite, cfg).await;

        assert!(outcome.passed);
        assert!(outcome.has_programmatic_focus);
        assert_eq!(outcome.exit_code(), EXIT_PASSED_WITH_FOCUS);
        assert_eq!((a.load(Ordering::SeqCst), b.load(Ordering::SeqCst), c.load(Ordering::SeqCst)), (0, 1, 0));
        assert_eq!(recorder.spec("A").unwrap().state, SpecState::Skipped);
        assert_eq!(recorder.spec("B").unwrap().state, SpecState::Passed);
        assert_eq!(recorder.spec("C").unwrap().state, SpecState::Skipped);
    }

    #[tokio::test]
    async fn test_focused_container_yields_to_focused_child() {
        let (outer, inner) = (counter(), counter());
        let mut suite = Suite::new();
        suite
            .fdescribe("outer", |s| {
                s.it("plain", bump(&outer))?;
                s.fit("focused", bump(&inner))
            })
            .unwrap();

        let (outcome, _) = run(&mut suite, config()).await;
        assert!(outcome.has_programmatic_focus);
        assert_eq!(outer.load(Ordering::SeqCst), 0);
        assert_eq!(inner.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_suite_timeout_aborts_remaining_specs() {
        let runs = counter();
        let mut suite = Suite::new();
        suite
            .describe("slow", |s| {
                for index in 1..=5 {
                    let runs = runs.clone();
                    s.it(format!("spec {index}"), move |_| {
                        runs.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(60));
                        Ok(())
                    })?;
                }
                Ok(())
            })
            .unwrap();

        let cfg = SuiteConfig {
            suite_timeout_ms: Some(100),
            ..config()
        };
        let (outcome, _) = run(&mut suite, cfg).await;

        assert!(!outcome.passed);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        let states: Vec<_> = outcome.specs.iter().map(|s| s.state).collect();
        assert_eq!(
            states,
            vec![
                SpecState::Passed,
                SpecState::Passed,
                SpecState::Aborted,
                SpecState::Aborted,
                SpecState::Aborted
            ]
        );
        assert_eq!(outcome.summary.number_of_aborted_specs, 3);
    }

    #[tokio::test]
    async fn test_after_suite_failure_fails_passing_suite() {
        let mut suite = Suite::new();
        suite.it("passes", |_| Ok(())).unwrap();
        suite
            .after_suite(|ctx| Err(ctx.fail("could not drop schema")))
            .unwrap();

        let (outcome, _) = run(&mut suite, config()).await;
        assert!(!outcome.passed);
        assert!(!outcome.summary.suite_succeeded);
        assert_eq!(outcome.summary.number_of_passed_specs, 1);
        assert_eq!(outcome.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_before_each_panic_still_tears_down() {
        let teardowns = counter();
        let mut suite = Suite::new();
        suite
            .describe("db", |s| {
                s.before_each(|_| panic!("boom"))?;
                s.after_each(bump(&teardowns))?;
                s.it("reads", |_| Ok(()))?;
                s.it("writes", |_| Ok(()))
            })
            .unwrap();

        let (outcome, _) = run(&mut suite, config()).await;
        assert!(!outcome.passed);
        assert_eq!(teardowns.load(Ordering::SeqCst), 2);
        for spec in &outcome.specs {
            assert_eq!(spec.state, SpecState::Panicked);
            let failure = spec.failure.as_ref().unwrap();
            assert_eq!(failure.forwarded_panic.as_deref(), Some("boom"));
            assert_eq!(failure.component_type, NodeType::BeforeEach);
        }
    }

    #[tokio::test]
    async fn test_pending_specs_never_run() {
        let runs = counter();
        let mut suite = Suite::new();
        suite.pit("later", bump(&runs)).unwrap();
        suite
            .xdescribe("parked", |s| {
                s.before_each(bump(&runs))?;
                s.it("inside", bump(&runs))
            })
            .unwrap();
        suite.it("now", |_| Ok(())).unwrap();

        let (outcome, _) = run(&mut suite, config()).await;
        assert!(outcome.passed);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(state_of(&outcome, "later"), SpecState::Pending);
        assert_eq!(state_of(&outcome, "parked inside"), SpecState::Pending);
        assert_eq!(outcome.summary.number_of_pending_specs, 2);
    }

    #[tokio::test]
    async fn test_fail_fast_aborts_after_first_failure() {
        let runs = counter();
        let mut suite = Suite::new();
        suite
            .describe("ordered", |s| {
                s.it("one", bump(&runs))?;
                s.it("two", |ctx| Err(ctx.fail("broken")))?;
                s.it("three", bump(&runs))
            })
            .unwrap();

        let cfg = SuiteConfig {
            fail_fast: true,
            ..config()
        };
        let (outcome, _) = run(&mut suite, cfg).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(state_of(&outcome, "ordered two"), SpecState::Failed);
        assert_eq!(state_of(&outcome, "ordered three"), SpecState::Aborted);
    }

    #[tokio::test]
    async fn test_regex_focus_and_skip() {
        let mut suite = Suite::new();
        suite
            .describe("Cache", |s| {
                s.it("hits", |_| Ok(()))?;
                s.it("evicts slowly", |_| Ok(()))
            })
            .unwrap();
        suite.it("Parser works", |_| Ok(())).unwrap();

        let cfg = SuiteConfig {
            focus_string: Some("Cache".to_string()),
            skip_string: Some("slow".to_string()),
            ..config()
        };
        let (outcome, _) = run(&mut suite, cfg).await;
        assert!(!outcome.has_programmatic_focus);
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(state_of(&outcome, "Cache hits"), SpecState::Passed);
        assert_eq!(state_of(&outcome, "Cache evicts slowly"), SpecState::Skipped);
        assert_eq!(state_of(&outcome, "Parser works"), SpecState::Skipped);
    }

    #[tokio::test]
    async fn test_invalid_focus_pattern_is_an_error() {
        let mut suite = Suite::new();
        suite.it("x", |_| Ok(())).unwrap();
        let cfg = SuiteConfig {
            focus_string: Some("(unclosed".to_string()),
            ..config()
        };
        let err = suite.run("s", &cfg, Vec::new()).await.unwrap_err();
        assert!(matches!(err, SuiteError::InvalidFocusPattern { .. }));
        assert!(!suite.is_running());

        let (outcome, _) = run(&mut suite, config()).await;
        assert!(outcome.passed);
        assert_eq!(state_of(&outcome, "x"), SpecState::Passed);
    }

    #[tokio::test]
    async fn test_include_file_limits_specs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("include.txt");
        std::fs::write(&path, "# rerun\nQueue drains\n").unwrap();

        let mut suite = Suite::new();
        suite
            .describe("Queue", |s| {
                s.it("drains", |_| Ok(()))?;
                s.it("fills", |_| Ok(()))
            })
            .unwrap();

        let cfg = SuiteConfig {
            include_file: Some(path),
            ..config()
        };
        let (outcome, _) = run(&mut suite, cfg).await;
        assert_eq!(state_of(&outcome, "Queue drains"), SpecState::Passed);
        assert_eq!(state_of(&outcome, "Queue fills"), SpecState::Skipped);
    }

    #[tokio::test]
    async fn test_same_seed_same_order() {
        fn build() -> Suite {
            let mut suite = Suite::new();
            for group in ["alpha", "bravo", "charlie", "delta", "echo", "foxtrot"] {
                suite
                    .describe(group, |s| {
                        s.it("first", |_| Ok(()))?;
                        s.it("second", |_| Ok(()))
                    })
                    .unwrap();
            }
            suite
        }

        let order = |outcome: &RunOutcome| -> Vec<String> {
            outcome.specs.iter().map(SpecSummary::full_text).collect()
        };

        let (first, _) = run(&mut build(), config()).await;
        let (second, _) = run(&mut build(), config()).await;
        assert_eq!(order(&first), order(&second));

        // groups move as a unit
        for pair in order(&first).chunks(2) {
            let group = pair[0].split(' ').next().unwrap();
            assert_eq!(pair[1], format!("{group} second"));
        }
    }

    #[tokio::test]
    async fn test_async_subject_times_out() {
        let mut suite = Suite::new();
        suite
            .it_async("never closes", Some(Duration::from_millis(20)), |_, done| {
                std::thread::spawn(move || {
                    std::thread::sleep(Duration::from_millis(300));
                    done.close();
                });
                Ok(())
            })
            .unwrap();

        let (outcome, _) = run(&mut suite, config()).await;
        assert_eq!(state_of(&outcome, "never closes"), SpecState::TimedOut);
        assert_eq!(outcome.summary.number_of_failed_specs, 1);
    }

    #[tokio::test]
    async fn test_measure_collects_samples() {
        let mut suite = Suite::new();
        suite
            .measure("encoding", 3, |ctx| {
                ctx.time("encode", || (0..1000).sum::<u64>());
                Ok(())
            })
            .unwrap();

        let (outcome, _) = run(&mut suite, config()).await;
        let spec = &outcome.specs[0];
        assert!(spec.passed());
        assert_eq!(spec.number_of_samples, 3);
        assert_eq!(spec.measurements["encode"].results.len(), 3);

        let mut skipping = Suite::new();
        skipping.measure("encoding", 3, |_| Ok(())).unwrap();
        let cfg = SuiteConfig {
            skip_measurements: true,
            ..config()
        };
        let (outcome, _) = run(&mut skipping, cfg).await;
        assert_eq!(outcome.specs[0].state, SpecState::Skipped);
    }

    #[test]
    fn test_measure_needs_a_sample() {
        let mut suite = Suite::new();
        let err = suite.measure("nothing", 0, |_| Ok(())).unwrap_err();
        assert!(matches!(err, SuiteError::InvalidSampleCount(_)));
    }

    #[test]
    fn test_duplicate_suite_hooks() {
        let mut suite = Suite::new();
        suite.before_suite(|_| Ok(())).unwrap();
        let err = suite.before_suite(|_| Ok(())).unwrap_err();
        assert!(matches!(err, SuiteError::DuplicateBeforeSuite(_)));

        suite.after_suite(|_| Ok(())).unwrap();
        let err = suite.after_suite(|_| Ok(())).unwrap_err();
        assert!(matches!(err, SuiteError::DuplicateAfterSuite(_)));
    }

    #[tokio::test]
    async fn test_declaring_after_run_is_an_error() {
        let mut suite = Suite::new();
        suite.it("only", |_| Ok(())).unwrap();
        let (outcome, _) = run(&mut suite, config()).await;
        assert!(outcome.passed);
        assert!(suite.is_running());

        let line = line!() + 1;
        let err = suite.it("late", |_| Ok(())).unwrap_err();
        match err {
            SuiteError::DeclaredAfterRun { kind, location } => {
                assert_eq!(kind, "It");
                assert_eq!(location.line, line);
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = suite.run("again", &config(), Vec::new()).await.unwrap_err();
        assert!(matches!(err, SuiteError::AlreadyRan));
    }

    #[test]
    fn test_registration_records_caller_location() {
        let mut suite = Suite::new();
        let line = line!() + 1;
        suite.describe("located", |s| s.it("here", |_| Ok(()))).unwrap();

        let container = suite.tree().container(1);
        assert_eq!(container.location.line, line);
        assert!(container.location.file.ends_with("mod.rs"));
        assert_eq!(suite.tree().subject(0).location.line, line);
    }

    #[tokio::test]
    async fn test_dry_run_reports_plan() {
        let runs = counter();
        let mut suite = Suite::new();
        suite.before_suite(bump(&runs)).unwrap();
        suite.it("would run", bump(&runs)).unwrap();

        let cfg = SuiteConfig {
            dry_run: true,
            ..config()
        };
        let (outcome, recorder) = run(&mut suite, cfg).await;
        assert!(outcome.passed);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(
            recorder.events(),
            vec![
                "SuiteWillBegin",
                "BeforeSuiteDidRun:PASSED",
                "SpecWillRun:would run",
                "SpecDidComplete:would run:PASSED",
                "SuiteDidEnd:true"
            ]
        );
    }
}
