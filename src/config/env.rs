//! Environment variable configuration
//!
//! Provides environment variable overrides for the suite configuration.

use std::env;
use std::path::PathBuf;

use super::SuiteConfig;

/// Environment variable prefix
const ENV_PREFIX: &str = "SPECTREE";

/// Overrides read from `SPECTREE_*` environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// From SPECTREE_SEED
    pub seed: Option<u64>,
    /// From SPECTREE_RANDOMIZE_ALL
    pub randomize_all: Option<bool>,
    /// From SPECTREE_FOCUS
    pub focus: Option<String>,
    /// From SPECTREE_SKIP
    pub skip: Option<String>,
    /// From SPECTREE_INCLUDE_FILE
    pub include_file: Option<PathBuf>,
    /// From SPECTREE_FAIL_ON_PENDING
    pub fail_on_pending: Option<bool>,
    /// From SPECTREE_FAIL_FAST
    pub fail_fast: Option<bool>,
    /// From SPECTREE_DRY_RUN
    pub dry_run: Option<bool>,
    /// From SPECTREE_SUITE_TIMEOUT_MS
    pub suite_timeout_ms: Option<u64>,
    /// From SPECTREE_SPEC_TIMEOUT_MS
    pub spec_timeout_ms: Option<u64>,
    /// From SPECTREE_FLAKE_ATTEMPTS
    pub flake_attempts: Option<u32>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            seed: get_env_parse("SEED"),
            randomize_all: get_env_bool("RANDOMIZE_ALL"),
            focus: get_env("FOCUS"),
            skip: get_env("SKIP"),
            include_file: get_env("INCLUDE_FILE").map(PathBuf::from),
            fail_on_pending: get_env_bool("FAIL_ON_PENDING"),
            fail_fast: get_env_bool("FAIL_FAST"),
            dry_run: get_env_bool("DRY_RUN"),
            suite_timeout_ms: get_env_parse("SUITE_TIMEOUT_MS"),
            spec_timeout_ms: get_env_parse("SPEC_TIMEOUT_MS"),
            flake_attempts: get_env_parse("FLAKE_ATTEMPTS"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.seed.is_some()
            || self.randomize_all.is_some()
            || self.focus.is_some()
            || self.skip.is_some()
            || self.include_file.is_some()
            || self.fail_on_pending.is_some()
            || self.fail_fast.is_some()
            || self.dry_run.is_some()
            || self.suite_timeout_ms.is_some()
            || self.spec_timeout_ms.is_some()
            || self.flake_attempts.is_some()
    }

    /// Overlay every variable that is set onto `config`
    pub fn apply(&self, config: &mut SuiteConfig) {
        if let Some(seed) = self.seed {
            config.random_seed = seed;
        }
        if let Some(randomize_all) = self.randomize_all {
            config.randomize_all_specs = randomize_all;
        }
        if let Some(focus) = &self.focus {
            config.focus_string = Some(focus.clone());
        }
        if let Some(skip) = &self.skip {
            config.skip_string = Some(skip.clone());
        }
        if let Some(path) = &self.include_file {
            config.include_file = Some(path.clone());
        }
        if let Some(fail_on_pending) = self.fail_on_pending {
            config.fail_on_pending = fail_on_pending;
        }
        if let Some(fail_fast) = self.fail_fast {
            config.fail_fast = fail_fast;
        }
        if let Some(dry_run) = self.dry_run {
            config.dry_run = dry_run;
        }
        if let Some(timeout) = self.suite_timeout_ms {
            config.suite_timeout_ms = Some(timeout);
        }
        if let Some(timeout) = self.spec_timeout_ms {
            config.spec_timeout_ms = timeout;
        }
        if let Some(attempts) = self.flake_attempts {
            config.flake_attempts = attempts;
        }
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Builder for setting environment variables (useful for testing)
#[derive(Default)]
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

impl EnvBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(self, seed: u64) -> Self {
        self.var("SEED", seed.to_string())
    }

    pub fn focus(self, focus: impl Into<String>) -> Self {
        self.var("FOCUS", focus.into())
    }

    pub fn skip(self, skip: impl Into<String>) -> Self {
        self.var("SKIP", skip.into())
    }

    pub fn fail_fast(self, fail_fast: bool) -> Self {
        self.var("FAIL_FAST", fail_fast.to_string())
    }

    pub fn suite_timeout_ms(self, timeout: u64) -> Self {
        self.var("SUITE_TIMEOUT_MS", timeout.to_string())
    }

    fn var(mut self, name: &str, value: String) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_{name}"), value));
        self
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        for (key, value) in self.vars {
            env::set_var(key, value);
        }

        EnvGuard { previous }
    }
}

/// Guard that restores environment variables on drop
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}
