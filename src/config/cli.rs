//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Aggregate mode (default) - coordinate a full run
    Aggregate,
    /// Worker mode - process one partition (spawned internally)
    #[value(hide = true)]
    Worker,
}

/// rateagg - Multi-process ratings aggregation
#[derive(Parser, Debug)]
#[command(name = "rateagg")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Execution mode
    #[arg(long, value_enum, default_value = "aggregate")]
    pub mode: ExecutionMode,

    /// Partition files, one worker process per file
    ///
    /// Worker mode expects exactly one (its assigned partition)
    #[arg(value_name = "PARTITION")]
    pub partitions: Vec<PathBuf>,

    // === Table Options ===
    /// Accumulator table capacity (number of item slots)
    #[arg(short = 'c', long)]
    pub capacity: Option<u64>,

    /// Shared-memory object name ('/name'); set automatically per run
    #[arg(long)]
    pub table: Option<String>,

    // === Output Options ===
    /// Write a JSON report to this path in addition to stdout
    #[arg(long)]
    pub json: Option<PathBuf>,

    // === Configuration ===
    /// TOML configuration file (CLI arguments take precedence)
    #[arg(long)]
    pub config: Option<PathBuf>,

    // === Worker Mode (internal) ===
    /// Worker id, assigned by the coordinator
    #[arg(long, hide = true, default_value = "0")]
    pub worker_id: usize,

    // === Diagnostics ===
    /// Enable debug diagnostics on stderr
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Cross-field checks clap cannot express
    pub fn validate(&self) -> crate::Result<()> {
        match self.mode {
            ExecutionMode::Aggregate => {
                if self.partitions.is_empty() && self.config.is_none() {
                    anyhow::bail!(
                        "at least one partition file (or --config) is required in aggregate mode"
                    );
                }
            }
            ExecutionMode::Worker => {
                if self.table.is_none() {
                    anyhow::bail!("--table is required in worker mode");
                }
                if self.partitions.len() != 1 {
                    anyhow::bail!(
                        "worker mode expects exactly one partition, got {}",
                        self.partitions.len()
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_default_mode_is_aggregate() {
        let cli = parse(&["rateagg", "part-0.txt"]);
        assert_eq!(cli.mode, ExecutionMode::Aggregate);
        assert_eq!(cli.partitions.len(), 1);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_multiple_partitions() {
        let cli = parse(&["rateagg", "a.txt", "b.txt", "c.txt"]);
        assert_eq!(cli.partitions.len(), 3);
    }

    #[test]
    fn test_capacity_flag() {
        let cli = parse(&["rateagg", "-c", "100", "a.txt"]);
        assert_eq!(cli.capacity, Some(100));
    }

    #[test]
    fn test_aggregate_requires_input() {
        let cli = parse(&["rateagg"]);
        assert!(cli.validate().is_err());

        let cli = parse(&["rateagg", "--config", "run.toml"]);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_worker_mode_arguments() {
        let cli = parse(&[
            "rateagg",
            "--mode",
            "worker",
            "--table",
            "/rateagg-1",
            "--worker-id",
            "2",
            "part-2.txt",
        ]);
        assert_eq!(cli.mode, ExecutionMode::Worker);
        assert_eq!(cli.worker_id, 2);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_worker_mode_requires_table_and_partition() {
        let cli = parse(&["rateagg", "--mode", "worker", "part.txt"]);
        assert!(cli.validate().is_err());

        let cli = parse(&["rateagg", "--mode", "worker", "--table", "/t"]);
        assert!(cli.validate().is_err());

        let cli = parse(&["rateagg", "--mode", "worker", "--table", "/t", "a", "b"]);
        assert!(cli.validate().is_err());
    }
}
