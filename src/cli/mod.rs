//! CLI argument parsing
//!
//! Suite options as clap arguments. Host binaries flatten [`SuiteArgs`]
//! into their own parser and overlay it onto a [`SuiteConfig`]; the
//! `spectree` binary uses [`Cli`] to manage configuration files.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{EnvConfig, SuiteConfig};

/// Spec suite configuration tool
#[derive(Parser, Debug)]
#[command(name = "spectree")]
#[command(version)]
#[command(about = "Manage configuration for spectree suites")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create, show or validate suite configuration
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a default configuration file
    Init {
        /// Output path (.yaml, .yml or .json)
        #[arg(short, long, default_value = "spectree.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the configuration a run would use (file, then env, then flags)
    Show {
        /// Configuration file to start from
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,

        #[command(flatten)]
        suite: SuiteArgs,
    },

    /// Check that a configuration file parses
    Validate {
        /// File to validate
        #[arg(default_value = "spectree.yaml")]
        file: PathBuf,
    },
}

/// Spec selection and execution options
#[derive(Args, Debug, Clone, Default)]
pub struct SuiteArgs {
    /// Seed used to randomize spec order
    #[arg(long)]
    pub seed: Option<u64>,

    /// Randomize every spec, not only top-level groups
    #[arg(long)]
    pub randomize_all: bool,

    /// Only run specs matching this regex
    #[arg(long)]
    pub focus: Option<String>,

    /// Skip specs matching this regex
    #[arg(long)]
    pub skip: Option<String>,

    /// File listing the full texts of specs to run
    #[arg(long)]
    pub include_file: Option<PathBuf>,

    /// Fail the suite if any spec is pending
    #[arg(long)]
    pub fail_on_pending: bool,

    /// Stop running specs after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Walk the plan without running anything
    #[arg(long)]
    pub dry_run: bool,

    /// Abort remaining specs after this many milliseconds
    #[arg(long)]
    pub suite_timeout_ms: Option<u64>,

    /// Default timeout for async nodes, in milliseconds
    #[arg(long)]
    pub spec_timeout_ms: Option<u64>,

    /// Attempts per failing spec
    #[arg(long)]
    pub flake_attempts: Option<u32>,

    /// Match focus/skip patterns against source file paths too
    #[arg(long)]
    pub regex_scans_file_path: bool,

    /// Emit a progress line before every hook
    #[arg(long)]
    pub progress: bool,

    /// Skip measure specs
    #[arg(long)]
    pub skip_measurements: bool,

    /// Stream spec output instead of buffering it
    #[arg(short, long)]
    pub verbose: bool,
}

impl SuiteArgs {
    /// Overlay the flags that were given onto `config`
    pub fn apply(&self, config: &mut SuiteConfig) {
        if let Some(seed) = self.seed {
            config.random_seed = seed;
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
        if let Some(timeout) = self.suite_timeout_ms {
            config.suite_timeout_ms = Some(timeout);
        }
        if let Some(timeout) = self.spec_timeout_ms {
            config.spec_timeout_ms = timeout;
        }
        if let Some(attempts) = self.flake_attempts {
            config.flake_attempts = attempts;
        }
        config.randomize_all_specs |= self.randomize_all;
        config.fail_on_pending |= self.fail_on_pending;
        config.fail_fast |= self.fail_fast;
        config.dry_run |= self.dry_run;
        config.regex_scans_file_path |= self.regex_scans_file_path;
        config.emit_spec_progress |= self.progress;
        config.skip_measurements |= self.skip_measurements;
        config.stream_output |= self.verbose;
    }

    pub fn into_config(self, mut base: SuiteConfig) -> SuiteConfig {
        self.apply(&mut base);
        base
    }

    /// Layer an optional config file, `SPECTREE_*` variables and these
    /// flags, in that order
    pub fn resolve(&self, file: Option<&Path>) -> Result<SuiteConfig> {
        let mut config = match file {
            Some(path) => SuiteConfig::load(path)?,
            None => SuiteConfig::default(),
        };
        EnvConfig::load().apply(&mut config);
        self.apply(&mut config);
        Ok(config)
    }
}
