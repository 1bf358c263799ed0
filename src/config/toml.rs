//! TOML configuration file parsing

use super::{Config, PartitionConfig};
use crate::config::cli::Cli;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config =
        ::toml::from_str(contents).context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Config {
    if !cli.partitions.is_empty() {
        config.partitions = cli
            .partitions
            .iter()
            .map(|path| PartitionConfig { path: path.clone() })
            .collect();
    }

    if let Some(capacity) = cli.capacity {
        config.table.capacity = capacity;
    }
    if let Some(ref name) = cli.table {
        config.table.name = Some(name.clone());
    }
    if let Some(ref json) = cli.json {
        config.output.json = Some(json.clone());
    }
    if cli.debug {
        config.runtime.debug = true;
    }

    config
}
