//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// ctigen - threat intelligence reports from analysis scripts
///
/// Aggregates a directory of analysis scripts, generates a two-part CTI
/// report and a Mermaid relationship diagram with Gemini, then opens an
/// interactive chat session.
///
/// Examples:
///   ctigen
///   ctigen --config ./ctigen.toml
///   ctigen --dry-run
///   ctigen --no-chat --quiet
///   ctigen --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = crate::config::DEFAULT_CONFIG_PATH,
        env = "CTIGEN_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the API base URL from the config file
    #[arg(long, value_name = "URL", env = "CTIGEN_API_BASE")]
    pub api_base: Option<String>,

    /// Skip the interactive chat session after the reports are written
    #[arg(long)]
    pub no_chat: bool,

    /// Dry run: aggregate scripts and render prompts without calling the API
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a sample ctigen.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref api_base) = self.api_base {
            if !api_base.starts_with("http://") && !api_base.starts_with("https://") {
                return Err("API base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
