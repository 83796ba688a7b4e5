//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use genotick_eval::config::Config;
use genotick_eval::AgentId;
use std::path::PathBuf;

/// genotick-eval - inspect and maintain a Genotick robot population
///
/// Examples:
///   genotick-eval init-config
///   genotick-eval --population ./robots list
///   genotick-eval list --from 10 --to 20
///   genotick-eval show 4611686018427387904
///   genotick-eval report --format json --output report.json
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .genotick.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Population directory (overrides [population] dir)
    #[arg(short, long, value_name = "DIR", global = true, env = "GENOTICK_POPULATION")]
    pub population: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Generate a default .genotick.toml configuration file
    InitConfig,

    /// List robot identities
    List {
        /// First index of the listing (inclusive)
        #[arg(long, requires = "to")]
        from: Option<usize>,

        /// Last index of the listing (exclusive)
        #[arg(long, requires = "from")]
        to: Option<usize>,
    },

    /// Show one robot's prediction history
    Show {
        /// Robot identity
        id: AgentId,

        /// Number of most recent predictions to print
        #[arg(long, default_value = "20", value_name = "COUNT")]
        last: usize,
    },

    /// Summarize every robot's prediction history
    Report {
        /// Output format (markdown, json)
        #[arg(long, default_value = "markdown", value_name = "FORMAT")]
        format: OutputFormat,

        /// Write the report to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Delete one robot
    Remove {
        /// Robot identity
        id: AgentId,
    },

    /// Delete every robot in the population
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Command::List {
            from: Some(from),
            to: Some(to),
        } = self.command
        {
            if from >= to {
                return Err(format!("--from ({}) must be lower than --to ({})", from, to));
            }
        }

        if let Command::Clear { yes: false } = self.command {
            return Err("Refusing to clear the population without --yes".to_string());
        }

        Ok(())
    }

    /// Apply CLI overrides on top of file configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(ref dir) = self.population {
            config.population.dir = dir.to_string_lossy().to_string();
        }

        if self.verbose {
            config.general.verbose = true;
        }
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
