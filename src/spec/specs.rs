//! Ordered spec collection with focus, skip and shuffle resolution

use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;

use super::include::IncludeList;
use super::spec::Spec;
use crate::error::SuiteError;

/// How much of the order [`Specs::shuffle`] may change
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShuffleScope {
    /// Permute top-level groups, keeping each group's internal order
    TopLevel,
    /// Permute every spec independently
    All,
}

#[derive(Debug, Default)]
pub struct Specs {
    specs: Vec<Spec>,
    has_programmatic_focus: bool,
    regex_scans_file_path: bool,
}

impl Specs {
    pub fn new(specs: Vec<Spec>) -> Self {
        Self {
            specs,
            has_programmatic_focus: false,
            regex_scans_file_path: false,
        }
    }

    /// Also match focus/skip patterns against the subject's source file
    pub fn with_regex_scans_file_path(mut self, enabled: bool) -> Self {
        self.regex_scans_file_path = enabled;
        self
    }

    pub fn specs(&self) -> &[Spec] {
        &self.specs
    }

    pub fn specs_mut(&mut self) -> &mut [Spec] {
        &mut self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn has_programmatic_focus(&self) -> bool {
        self.has_programmatic_focus
    }

    /// Sort by text, then permute within `scope` using `rng`
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R, scope: ShuffleScope) {
        match scope {
            ShuffleScope::All => {
                self.specs
                    .sort_by_cached_key(|spec| spec.concatenated_string());
                self.specs.shuffle(rng);
            }
            ShuffleScope::TopLevel => {
                let mut groups: Vec<Vec<Spec>> = Vec::new();
                let mut keys = Vec::new();
                for spec in self.specs.drain(..) {
                    let key = spec.top_level_key();
                    match keys.iter().position(|k| *k == key) {
                        Some(index) => groups[index].push(spec),
                        None => {
                            keys.push(key);
                            groups.push(vec![spec]);
                        }
                    }
                }
                groups.sort_by(|a, b| a[0].top_level_text().cmp(b[0].top_level_text()));
                groups.shuffle(rng);
                self.specs = groups.into_iter().flatten().collect();
            }
        }
    }

    /// Resolve which specs are eligible to run.
    ///
    /// If any non-pending spec is programmatically focused, every unfocused
    /// spec is skipped and the patterns are ignored. Otherwise a spec is
    /// skipped when a non-empty `focus` does not match or a non-empty `skip`
    /// matches `description + " " + concatenated text`.
    pub fn apply_focus(
        &mut self,
        description: &str,
        focus: Option<&str>,
        skip: Option<&str>,
    ) -> Result<(), SuiteError> {
        self.has_programmatic_focus = self
            .specs
            .iter()
            .any(|spec| spec.focused() && !spec.pending());

        if self.has_programmatic_focus {
            for spec in self.specs.iter_mut().filter(|spec| !spec.focused()) {
                spec.skip();
            }
            return Ok(());
        }

        let focus = compile(focus, |pattern, source| SuiteError::InvalidFocusPattern {
            pattern,
            source,
        })?;
        let skip = compile(skip, |pattern, source| SuiteError::InvalidSkipPattern {
            pattern,
            source,
        })?;
        if focus.is_none() && skip.is_none() {
            return Ok(());
        }

        let scans_file_path = self.regex_scans_file_path;
        for spec in &mut self.specs {
            let target = match_target(description, spec, scans_file_path);
            let matches_focus = focus.as_ref().map_or(true, |re| re.is_match(&target));
            let matches_skip = skip.as_ref().map_or(false, |re| re.is_match(&target));
            if !matches_focus || matches_skip {
                spec.skip();
            }
        }
        Ok(())
    }

    /// Skip every spec whose full text is not listed
    pub fn apply_include_list(&mut self, list: &IncludeList) {
        for spec in &mut self.specs {
            if !list.contains(&spec.concatenated_string()) {
                spec.skip();
            }
        }
    }

    pub fn skip_measurements(&mut self) {
        for spec in self.specs.iter_mut().filter(|spec| spec.is_measurement()) {
            spec.skip();
        }
    }
}

fn compile(
    pattern: Option<&str>,
    on_error: impl FnOnce(String, regex::Error) -> SuiteError,
) -> Result<Option<Regex>, SuiteError> {
    match pattern.filter(|p| !p.is_empty()) {
        None => Ok(None),
        Some(p) => Regex::new(p)
            .map(Some)
            .map_err(|source| on_error(p.to_string(), source)),
    }
}

fn match_target(description: &str, spec: &Spec, scans_file_path: bool) -> String {
    let mut target = format!("{} {}", description, spec.concatenated_string());
    if scans_file_path {
        target.push(' ');
        target.push_str(spec.subject().location.file_name());
    }
    target
}
