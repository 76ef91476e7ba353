//! Suite usage errors
//!
//! Errors raised by the registration surface and by run-time setup
//! (pattern compilation, include-list loading). Spec failures are not
//! errors; they are recorded as [`SpecState`](crate::models::SpecState).

use std::path::PathBuf;
use thiserror::Error;

use crate::models::CodeLocation;

/// Usage errors raised at the call site
#[derive(Error, Debug)]
pub enum SuiteError {
    #[error("You may only call BeforeSuite once (second call at {0})")]
    DuplicateBeforeSuite(CodeLocation),

    #[error("You may only call AfterSuite once (second call at {0})")]
    DuplicateAfterSuite(CodeLocation),

    #[error("You may only declare tests before running the suite ({kind} declared at {location})")]
    DeclaredAfterRun {
        kind: &'static str,
        location: CodeLocation,
    },

    #[error("A suite can only be run once")]
    AlreadyRan,

    #[error("Measure nodes need at least one sample ({0})")]
    InvalidSampleCount(CodeLocation),

    #[error("Invalid focus pattern {pattern:?}: {source}")]
    InvalidFocusPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid skip pattern {pattern:?}: {source}")]
    InvalidSkipPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Failed to read include file {path}: {source}")]
    IncludeFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_location() {
        let location = CodeLocation::new("suite_test.rs", 12);
        let err = SuiteError::DuplicateBeforeSuite(location);
        assert_eq!(
            err.to_string(),
            "You may only call BeforeSuite once (second call at suite_test.rs:12)"
        );

        let err = SuiteError::DeclaredAfterRun {
            kind: "It",
            location: CodeLocation::new("late.rs", 3),
        };
        assert!(err.to_string().contains("It declared at late.rs:3"));
    }
}
