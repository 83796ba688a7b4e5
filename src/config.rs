//! Configuration file handling.
//!
//! This module handles loading configuration from `.genotick.toml` files
//! and turning its sections into pool and round options.

use crate::evaluation::RoundOptions;
use crate::pool::PoolOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".genotick.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Worker pool settings.
    #[serde(default)]
    pub pool: PoolConfig,

    /// Evaluation round settings.
    #[serde(default)]
    pub round: RoundConfig,

    /// Population storage settings.
    #[serde(default)]
    pub population: PopulationConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Worker pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Worker slots per available CPU.
    #[serde(default = "default_threads_per_core")]
    pub threads_per_core: usize,

    /// Upper bound on worker slots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            threads_per_core: default_threads_per_core(),
            max_workers: None,
        }
    }
}

fn default_threads_per_core() -> usize {
    2
}

/// Evaluation round behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundConfig {
    /// Record predictions into robots and persist them after each round.
    #[serde(default = "default_true")]
    pub update_agents: bool,

    /// Drop result batches whose UP and DOWN counts differ.
    #[serde(default)]
    pub require_symmetrical_batches: bool,

    /// Milliseconds per wait on a pending task (0 = wait uninterrupted).
    #[serde(default = "default_wait_slice_ms")]
    pub wait_slice_ms: u64,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            update_agents: true,
            require_symmetrical_batches: false,
            wait_slice_ms: default_wait_slice_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_wait_slice_ms() -> u64 {
    500
}

/// Population storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Directory holding `<id>.prg` robot files.
    #[serde(default = "default_population_dir")]
    pub dir: String,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            dir: default_population_dir(),
        }
    }
}

fn default_population_dir() -> String {
    "population".to_string()
}

impl From<&PoolConfig> for PoolOptions {
    fn from(config: &PoolConfig) -> Self {
        Self {
            threads_per_core: config.threads_per_core,
            max_workers: config.max_workers,
        }
    }
}

impl From<&RoundConfig> for RoundOptions {
    fn from(config: &RoundConfig) -> Self {
        Self {
            update_agents: config.update_agents,
            require_symmetrical_batches: config.require_symmetrical_batches,
            wait_slice: (config.wait_slice_ms > 0)
                .then(|| Duration::from_millis(config.wait_slice_ms)),
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions::from(&self.pool)
    }

    pub fn round_options(&self) -> RoundOptions {
        RoundOptions::from(&self.round)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
