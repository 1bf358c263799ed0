//! Configuration validation

use super::Config;
use crate::table::MAX_CAPACITY;
use anyhow::Result;
use std::collections::HashSet;

/// Validate complete configuration
///
/// Runs before any allocation, so a bad capacity or an empty partition list
/// never reaches the shared-memory layer.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_table(config)?;
    validate_partitions(config)?;
    Ok(())
}

fn validate_table(config: &Config) -> Result<()> {
    let capacity = config.table.capacity;
    if capacity == 0 || capacity > MAX_CAPACITY {
        anyhow::bail!(
            "table capacity must be between 1 and {}, got {}",
            MAX_CAPACITY,
            capacity
        );
    }

    if let Some(ref name) = config.table.name {
        if !name.starts_with('/') || name.len() < 2 || name[1..].contains('/') {
            anyhow::bail!(
                "table name must be '/name' with no interior slashes, got '{}'",
                name
            );
        }
        if name.len() > 255 {
            anyhow::bail!("table name exceeds 255 characters");
        }
    }

    Ok(())
}

fn validate_partitions(config: &Config) -> Result<()> {
    if config.partitions.is_empty() {
        anyhow::bail!("at least one partition is required");
    }

    // Legal but almost certainly a mistake: the same file would be counted twice
    let mut seen = HashSet::new();
    for partition in &config.partitions {
        if partition.path.as_os_str().is_empty() {
            anyhow::bail!("partition path is empty");
        }
        if !seen.insert(&partition.path) {
            eprintln!(
                "Warning: partition {} is listed more than once; its records will be double-counted",
                partition.path.display()
            );
        }
    }

    Ok(())
}
