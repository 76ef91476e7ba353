//! spectree - configuration tool for spectree suites
//!
//! Suites are ordinary Rust programs that declare specs on a
//! [`spectree::Suite`] and call `run`. This binary manages the
//! configuration those programs load.
//!
//! ## Usage
//!
//! ```bash
//! # Write a default configuration file
//! spectree config init --output spectree.yaml
//!
//! # Show the configuration a run would resolve to
//! SPECTREE_SEED=7 spectree config show --config spectree.yaml --fail-fast
//!
//! # Check a configuration file
//! spectree config validate spectree.yaml
//! ```

use anyhow::Result;
use clap::Parser;
use tracing::info;

use spectree::cli::{Cli, Command, ConfigAction};
use spectree::config::SuiteConfig;
use spectree::utils::{init_logger, LogLevel};

fn main() -> Result<()> {
    let args = Cli::parse();
    init_logger(if args.debug { LogLevel::Debug } else { LogLevel::Info });

    match args.command {
        Command::Config(config_args) => manage_config(config_args.action),
    }
}

fn manage_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Init { output, force } => {
            if output.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {}. Use --force to overwrite.",
                    output.display()
                );
            }

            SuiteConfig::default().save(&output)?;
            println!("✓ Configuration file created: {}", output.display());
        }

        ConfigAction::Show {
            config,
            format,
            suite,
        } => {
            let resolved = suite.resolve(config.as_deref())?;
            info!("Resolved configuration with seed {}", resolved.random_seed);
            let output = if format == "json" {
                serde_json::to_string_pretty(&resolved)?
            } else {
                serde_yaml::to_string(&resolved)?
            };
            println!("{output}");
        }

        ConfigAction::Validate { file } => match SuiteConfig::load(&file) {
            Ok(_) => {
                println!("✓ Configuration file is valid: {}", file.display());
            }
            Err(e) => {
                println!("✗ Configuration file is invalid: {}", file.display());
                println!("  Error: {e}");
                return Err(e);
            }
        },
    }

    Ok(())
}
