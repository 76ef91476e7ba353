//! Externally supplied include list
//!
//! One full spec text per line (container texts and subject text joined by
//! spaces). Blank lines and `#` comments are ignored.

use std::collections::HashSet;
use std::path::Path;

use crate::error::SuiteError;

#[derive(Clone, Debug, Default)]
pub struct IncludeList {
    entries: HashSet<String>,
}

impl IncludeList {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SuiteError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SuiteError::IncludeFile {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        Self::from_entries(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        )
    }

    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, full_text: &str) -> bool {
        self.entries.contains(full_text)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
