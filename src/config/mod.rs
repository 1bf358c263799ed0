//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//! The core consumes a fully built `Config`; where the partition list and
//! capacity come from (flags, a TOML file, or both with CLI precedence) is
//! decided here, outside the aggregation machinery.

pub mod cli;
pub mod toml;
pub mod validator;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub table: TableConfig,
    #[serde(default, rename = "partition")]
    pub partitions: Vec<PartitionConfig>,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl Config {
    /// Shared-memory object name for this run
    ///
    /// Defaults to a pid-derived name so concurrent runs do not collide;
    /// a configured name overrides it (tests and debugging).
    pub fn effective_table_name(&self) -> String {
        self.table
            .name
            .clone()
            .unwrap_or_else(crate::table::default_table_name)
    }
}

/// Accumulator table configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Number of item slots; item identifiers map to `[1, capacity]`
    #[serde(default = "default_capacity")]
    pub capacity: u64,
    /// Shared-memory object name override
    #[serde(default)]
    pub name: Option<String>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            name: None,
        }
    }
}

/// The MovieLens-100k item count, the dataset this tool grew up on
fn default_capacity() -> u64 {
    1682
}

/// One input partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    pub path: PathBuf,
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Write a JSON report here in addition to the stdout listing
    #[serde(default)]
    pub json: Option<PathBuf>,
}

/// Runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Emit DEBUG diagnostics on stderr
    #[serde(default)]
    pub debug: bool,
}
