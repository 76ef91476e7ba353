//! Failure recorder
//!
//! The [`Failer`] is a single slot holding the first failure, skip, panic or
//! timeout recorded while a node executes. [`Failer::begin_node`] opens a new
//! generation for every node run; records stamped with an older generation
//! (from a body abandoned after a timeout) are dropped.
//!
//! Bodies stop cooperatively: [`Failer::fail`] and [`Failer::skip`] hand back
//! a [`Halt`] which the body returns as `Err(halt)`. A `Halt` can only be
//! obtained from the failer, so the runner never has to guess whether an
//! early exit was an intentional stop or a real defect.

use std::sync::{Mutex, PoisonError};

use crate::models::{CodeLocation, NodeType, SpecFailure, SpecState};

/// Proof that the failer recorded a stop for the current node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "return the Halt from the node body to stop it"]
pub struct Halt {
    state: SpecState,
}

impl Halt {
    /// State the failer recorded (or had already recorded) for this node
    pub fn state(&self) -> SpecState {
        self.state
    }
}

/// Return type of every node body
pub type BodyResult = Result<(), Halt>;

#[derive(Debug)]
struct Record {
    state: SpecState,
    message: String,
    location: CodeLocation,
    forwarded_panic: Option<String>,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    record: Option<Record>,
}

/// Single-slot recorder of the first outcome for the running node
#[derive(Debug, Default)]
pub struct Failer {
    slot: Mutex<Slot>,
}

impl Failer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the slot and start a new generation for the next node run
    pub fn begin_node(&self) -> u64 {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.generation += 1;
        slot.record = None;
        slot.generation
    }

    /// Generation of the node currently running
    pub fn generation(&self) -> u64 {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    /// Record a failure; later calls for the same node are no-ops
    pub fn fail(&self, message: impl Into<String>, location: CodeLocation) -> Halt {
        self.record_first(None, SpecState::Failed, message.into(), location, None)
    }

    /// Record a runtime skip; later calls for the same node are no-ops
    pub fn skip(&self, message: impl Into<String>, location: CodeLocation) -> Halt {
        self.record_first(None, SpecState::Skipped, message.into(), location, None)
    }

    /// [`fail`](Failer::fail) on behalf of the node run `generation`
    pub fn fail_for(
        &self,
        generation: u64,
        message: impl Into<String>,
        location: CodeLocation,
    ) -> Halt {
        self.record_first(Some(generation), SpecState::Failed, message.into(), location, None)
    }

    /// [`skip`](Failer::skip) on behalf of the node run `generation`
    pub fn skip_for(
        &self,
        generation: u64,
        message: impl Into<String>,
        location: CodeLocation,
    ) -> Halt {
        self.record_first(Some(generation), SpecState::Skipped, message.into(), location, None)
    }

    /// Record an uncaught panic unless a failure was already recorded
    pub fn panic(&self, location: CodeLocation, forwarded_panic: impl Into<String>) {
        let _ = self.record_first(
            None,
            SpecState::Panicked,
            "Test Panicked".to_string(),
            location,
            Some(forwarded_panic.into()),
        );
    }

    /// Record that the node lost its completion race against the timer.
    ///
    /// A timeout outranks anything the abandoned body recorded before the
    /// deadline.
    pub fn timeout(&self, location: CodeLocation) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.record = Some(Record {
            state: SpecState::TimedOut,
            message: "Timed out".to_string(),
            location,
            forwarded_panic: None,
        });
    }

    /// True if anything was recorded since the last drain
    pub fn has_record(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record
            .is_some()
    }

    /// Take the recorded outcome, resetting the slot for the next node
    pub fn drain(
        &self,
        component_type: NodeType,
        component_index: usize,
        component_location: &CodeLocation,
    ) -> (SpecState, Option<SpecFailure>) {
        let record = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record
            .take();

        match record {
            None => (SpecState::Passed, None),
            Some(record) => (
                record.state,
                Some(SpecFailure {
                    message: record.message,
                    location: record.location,
                    forwarded_panic: record.forwarded_panic,
                    component_index,
                    component_type,
                    component_code_location: component_location.clone(),
                }),
            ),
        }
    }

    /// `generation` of `None` records for whichever node is running
    fn record_first(
        &self,
        generation: Option<u64>,
        state: SpecState,
        message: String,
        location: CodeLocation,
        forwarded_panic: Option<String>,
    ) -> Halt {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if generation.is_some_and(|generation| generation != slot.generation) {
            return Halt { state };
        }
        match slot.record.as_ref() {
            Some(existing) => Halt {
                state: existing.state,
            },
            None => {
                slot.record = Some(Record {
                    state,
                    message,
                    location,
                    forwarded_panic,
                });
                Halt { state }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(line: u32) -> CodeLocation {
        CodeLocation::new("failer_test.rs", line)
    }

    #[test]
    fn test_drain_without_record_passes() {
        let failer = Failer::new();
        let (state, failure) = failer.drain(NodeType::It, 1, &loc(1));
        assert_eq!(state, SpecState::Passed);
        assert!(failure.is_none());
    }

    #[test]
    fn test_first_failure_wins() {
        let failer = Failer::new();
        let halt = failer.fail("first", loc(10));
        assert_eq!(halt.state(), SpecState::Failed);

        let second = failer.skip("second", loc(11));
        assert_eq!(second.state(), SpecState::Failed);
        failer.panic(loc(12), "boom");

        let (state, failure) = failer.drain(NodeType::BeforeEach, 2, &loc(9));
        assert_eq!(state, SpecState::Failed);
        let failure = failure.expect("failure recorded");
        assert_eq!(failure.message, "first");
        assert_eq!(failure.location, loc(10));
        assert_eq!(failure.component_index, 2);
        assert_eq!(failure.component_type, NodeType::BeforeEach);
        assert_eq!(failure.component_code_location, loc(9));
        assert!(failure.forwarded_panic.is_none());
    }

    #[test]
    fn test_drain_resets_slot() {
        let failer = Failer::new();
        let _ = failer.skip("not today", loc(3));
        assert!(failer.has_record());
        let (state, _) = failer.drain(NodeType::It, 0, &loc(1));
        assert_eq!(state, SpecState::Skipped);
        assert!(!failer.has_record());
        let (state, _) = failer.drain(NodeType::It, 0, &loc(1));
        assert_eq!(state, SpecState::Passed);
    }

    #[test]
    fn test_panic_forwards_payload() {
        let failer = Failer::new();
        failer.panic(loc(5), "boom");
        let (state, failure) = failer.drain(NodeType::It, 1, &loc(4));
        assert_eq!(state, SpecState::Panicked);
        assert_eq!(failure.unwrap().forwarded_panic.as_deref(), Some("boom"));
    }

    #[test]
    fn test_timeout_overrides_earlier_record() {
        let failer = Failer::new();
        let _ = failer.fail("slow assertion", loc(7));
        failer.timeout(loc(6));
        let (state, failure) = failer.drain(NodeType::It, 1, &loc(6));
        assert_eq!(state, SpecState::TimedOut);
        assert_eq!(failure.unwrap().message, "Timed out");
    }

    #[test]
    fn test_stale_generation_is_dropped() {
        let failer = Failer::new();
        let abandoned = failer.begin_node();
        let current = failer.begin_node();
        assert_eq!(failer.generation(), current);

        let halt = failer.fail_for(abandoned, "late failure", loc(20));
        assert_eq!(halt.state(), SpecState::Failed);
        assert!(!failer.has_record());

        let _ = failer.skip_for(current, "skipped for real", loc(21));
        let (state, failure) = failer.drain(NodeType::It, 1, &loc(19));
        assert_eq!(state, SpecState::Skipped);
        assert_eq!(failure.unwrap().message, "skipped for real");
    }

    #[test]
    fn test_begin_node_clears_previous_record() {
        let failer = Failer::new();
        let first = failer.begin_node();
        let _ = failer.fail_for(first, "left over", loc(30));
        failer.begin_node();
        assert!(!failer.has_record());
    }
}
