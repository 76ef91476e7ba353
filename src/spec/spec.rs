//! A single runnable spec
//!
//! One subject plus its ancestor chain. Holds the run-result fields, which
//! are the only part of a spec that changes after construction.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::containernode::{CollatedNodes, ContainerNode, ContainerTree};
use crate::leafnodes::{Benchmarker, LeafNode, RunEnv};
use crate::models::{FlagType, NodeType, SpecFailure, SpecState, SpecSummary};

#[derive(Debug)]
pub struct Spec {
    tree: Arc<ContainerTree>,
    containers: Vec<usize>,
    subject: usize,
    focused: bool,
    state: SpecState,
    filtered_out: bool,
    run_time: Duration,
    failure: Option<SpecFailure>,
    previous_failures: bool,
    benchmarker: Arc<Mutex<Benchmarker>>,
}

impl Spec {
    /// Flatten one collated path.
    ///
    /// Flags are read subject first, then containers innermost to
    /// outermost. Pending and Focused are tracked independently.
    pub fn new(tree: Arc<ContainerTree>, collated: CollatedNodes) -> Self {
        let mut spec = Self {
            tree,
            containers: collated.containers,
            subject: collated.subject,
            focused: false,
            state: SpecState::Invalid,
            filtered_out: false,
            run_time: Duration::ZERO,
            failure: None,
            previous_failures: false,
            benchmarker: Arc::new(Mutex::new(Benchmarker::new())),
        };

        let subject_flag = spec.subject().flag;
        spec.process_flag(subject_flag);
        for index in (0..spec.containers.len()).rev() {
            let flag = spec.tree.container(spec.containers[index]).flag;
            spec.process_flag(flag);
        }
        spec
    }

    fn process_flag(&mut self, flag: FlagType) {
        match flag {
            FlagType::Focused => self.focused = true,
            FlagType::Pending => self.state = SpecState::Pending,
            FlagType::None => {}
        }
    }

    pub fn subject(&self) -> &LeafNode {
        self.tree.subject(self.subject)
    }

    pub fn containers(&self) -> impl Iterator<Item = &ContainerNode> + '_ {
        self.containers.iter().map(|&id| self.tree.container(id))
    }

    /// Id of the top-level child of the root this spec descends from
    pub(crate) fn top_level_key(&self) -> (bool, usize) {
        match self.containers.get(1) {
            Some(&id) => (true, id),
            None => (false, self.subject),
        }
    }

    /// Text of the top-level child this spec descends from
    pub(crate) fn top_level_text(&self) -> &str {
        match self.containers.get(1) {
            Some(&id) => &self.tree.container(id).text,
            None => &self.subject().text,
        }
    }

    pub fn state(&self) -> SpecState {
        self.state
    }

    pub fn failure(&self) -> Option<&SpecFailure> {
        self.failure.as_ref()
    }

    pub fn run_time(&self) -> Duration {
        self.run_time
    }

    pub fn focused(&self) -> bool {
        self.focused
    }

    pub fn pending(&self) -> bool {
        self.state == SpecState::Pending
    }

    pub fn skipped(&self) -> bool {
        self.state == SpecState::Skipped
    }

    pub fn aborted(&self) -> bool {
        self.state == SpecState::Aborted
    }

    pub fn passed(&self) -> bool {
        self.state == SpecState::Passed
    }

    pub fn failed(&self) -> bool {
        self.state.is_failure()
    }

    /// Passed on a later attempt after failing an earlier one
    pub fn flaked(&self) -> bool {
        self.passed() && self.previous_failures
    }

    pub fn filtered_out(&self) -> bool {
        self.filtered_out
    }

    pub fn is_measurement(&self) -> bool {
        self.subject().is_measurement()
    }

    /// Exclude from the run. A pending spec stays pending.
    pub fn skip(&mut self) {
        self.filtered_out = true;
        if self.state != SpecState::Pending {
            self.state = SpecState::Skipped;
        }
    }

    pub fn abort(&mut self) {
        self.state = SpecState::Aborted;
    }

    pub(crate) fn fail_without_running(&mut self, failure: Option<SpecFailure>) {
        self.state = SpecState::Failed;
        self.failure = failure;
    }

    pub(crate) fn mark_passed_without_running(&mut self) {
        if self.state == SpecState::Invalid {
            self.state = SpecState::Passed;
        }
    }

    /// Container texts (root excluded) and subject text, space separated
    pub fn concatenated_string(&self) -> String {
        let mut parts: Vec<&str> = self
            .containers()
            .skip(1)
            .map(|container| container.text.as_str())
            .collect();
        parts.push(&self.subject().text);
        parts.join(" ")
    }

    pub fn summary(&self, suite_id: &str) -> SpecSummary {
        let subject = self.subject();
        let mut component_texts: Vec<String> =
            self.containers().map(|c| c.text.clone()).collect();
        let mut component_code_locations: Vec<_> =
            self.containers().map(|c| c.location.clone()).collect();
        component_texts.push(subject.text.clone());
        component_code_locations.push(subject.location.clone());

        let measurements = if subject.is_measurement() {
            self.benchmarker
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .report()
        } else {
            BTreeMap::new()
        };

        SpecSummary {
            component_texts,
            component_code_locations,
            state: self.state,
            run_time: self.run_time,
            failure: self.failure.clone(),
            is_measurement: subject.is_measurement(),
            number_of_samples: subject.samples,
            measurements,
            captured_output: String::new(),
            suite_id: suite_id.to_string(),
            filtered_out: self.filtered_out,
            flaked: self.flaked(),
        }
    }

    /// Run every sample, stopping at the first one that does not pass.
    /// The recorded run time is that of the last sample executed.
    pub async fn run(&mut self, env: &RunEnv) {
        if self.failed() {
            self.previous_failures = true;
        }

        let samples = self.subject().samples.max(1);
        for _ in 0..samples {
            let start = Instant::now();
            self.run_sample(env).await;
            self.run_time = start.elapsed();
            if self.state != SpecState::Passed {
                return;
            }
        }
    }

    async fn run_sample(&mut self, env: &RunEnv) {
        self.state = SpecState::Passed;
        self.failure = None;

        let tree = Arc::clone(&self.tree);
        let mut innermost_entered = None;
        let mut subject_reached = false;
        let (state, failure) = self
            .run_setup_and_subject(&tree, env, &mut innermost_entered, &mut subject_reached)
            .await;
        self.state = state;
        self.failure = failure;

        let Some(innermost) = innermost_entered else {
            return;
        };

        // teardown mirrors setup: every entered container, inner to outer.
        // JustAfterEach only follows a subject that actually ran.
        let teardown: &[NodeType] = if subject_reached {
            &[NodeType::JustAfterEach, NodeType::AfterEach]
        } else {
            &[NodeType::AfterEach]
        };
        for &node_type in teardown {
            for index in (0..=innermost).rev() {
                let container = tree.container(self.containers[index]);
                for node in container.setup_nodes(node_type) {
                    announce(env, node_type, &container.text, node);
                    let outcome = node.run(env, index, None).await;
                    if !outcome.passed() && self.state == SpecState::Passed {
                        self.state = outcome.state;
                        self.failure = outcome.failure;
                    }
                }
            }
        }
    }

    async fn run_setup_and_subject(
        &self,
        tree: &ContainerTree,
        env: &RunEnv,
        innermost_entered: &mut Option<usize>,
        subject_reached: &mut bool,
    ) -> (SpecState, Option<SpecFailure>) {
        for (index, &id) in self.containers.iter().enumerate() {
            *innermost_entered = Some(index);
            let container = tree.container(id);
            for node in container.setup_nodes(NodeType::BeforeEach) {
                announce(env, NodeType::BeforeEach, &container.text, node);
                let outcome = node.run(env, index, None).await;
                if !outcome.passed() {
                    return (outcome.state, outcome.failure);
                }
            }
        }

        for (index, &id) in self.containers.iter().enumerate() {
            let container = tree.container(id);
            for node in container.setup_nodes(NodeType::JustBeforeEach) {
                announce(env, NodeType::JustBeforeEach, &container.text, node);
                let outcome = node.run(env, index, None).await;
                if !outcome.passed() {
                    return (outcome.state, outcome.failure);
                }
            }
        }

        let subject = tree.subject(self.subject);
        *subject_reached = true;
        announce(env, subject.node_type, &subject.text, subject);
        let benchmarker = subject
            .is_measurement()
            .then(|| Arc::clone(&self.benchmarker));
        let outcome = subject.run(env, self.containers.len(), benchmarker).await;
        (outcome.state, outcome.failure)
    }
}

fn announce(env: &RunEnv, node_type: NodeType, text: &str, node: &LeafNode) {
    if env.emit_progress {
        env.capture
            .append(format!("[{}] {}\n  {}\n", node_type, text, node.location).as_bytes());
    }
}
