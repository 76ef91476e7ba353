//! Core vocabulary types
//!
//! Spec states, node flags, node types and source locations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::Location;

/// Execution state of a spec or suite node
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecState {
    /// Not yet run
    #[default]
    Invalid,
    Pending,
    Skipped,
    Passed,
    Failed,
    Panicked,
    TimedOut,
    Aborted,
}

impl SpecState {
    pub fn symbol(&self) -> &'static str {
        match self {
            SpecState::Invalid => "?",
            SpecState::Pending => "P",
            SpecState::Skipped => "S",
            SpecState::Passed => "•",
            SpecState::Failed => "✗",
            SpecState::Panicked => "!",
            SpecState::TimedOut => "⏱",
            SpecState::Aborted => "A",
        }
    }

    /// Failed, Panicked and TimedOut are failures; everything else is not
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SpecState::Failed | SpecState::Panicked | SpecState::TimedOut
        )
    }

    /// True for every state a finished spec can be left in
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SpecState::Invalid)
    }
}

impl fmt::Display for SpecState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecState::Invalid => write!(f, "INVALID"),
            SpecState::Pending => write!(f, "PENDING"),
            SpecState::Skipped => write!(f, "SKIPPED"),
            SpecState::Passed => write!(f, "PASSED"),
            SpecState::Failed => write!(f, "FAILED"),
            SpecState::Panicked => write!(f, "PANICKED"),
            SpecState::TimedOut => write!(f, "TIMED OUT"),
            SpecState::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// Visibility flag carried by containers and leaf nodes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagType {
    #[default]
    None,
    Focused,
    Pending,
}

/// Kind of node a failure or summary originates from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Container,
    BeforeSuite,
    AfterSuite,
    BeforeEach,
    JustBeforeEach,
    JustAfterEach,
    AfterEach,
    It,
    Measure,
}

impl NodeType {
    pub fn name(&self) -> &'static str {
        match self {
            NodeType::Container => "Container",
            NodeType::BeforeSuite => "BeforeSuite",
            NodeType::AfterSuite => "AfterSuite",
            NodeType::BeforeEach => "BeforeEach",
            NodeType::JustBeforeEach => "JustBeforeEach",
            NodeType::JustAfterEach => "JustAfterEach",
            NodeType::AfterEach => "AfterEach",
            NodeType::It => "It",
            NodeType::Measure => "Measure",
        }
    }

    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            NodeType::BeforeEach
                | NodeType::JustBeforeEach
                | NodeType::JustAfterEach
                | NodeType::AfterEach
        )
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Source location of a declaration or failure
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeLocation {
    pub file: String,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_stack_trace: Option<String>,
}

impl CodeLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
            full_stack_trace: None,
        }
    }

    /// Location of the caller, propagated through `#[track_caller]` frames
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self::new(location.file(), location.line())
    }

    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.full_stack_trace = Some(trace.into());
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file
    }
}

impl fmt::Display for CodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}
