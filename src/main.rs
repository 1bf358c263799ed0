//! rateagg CLI entry point

use anyhow::Result;
use rateagg::config::cli::{Cli, ExecutionMode};
use rateagg::config::{toml as config_toml, validator, Config, PartitionConfig};
use rateagg::coordinator::Coordinator;
use rateagg::output::{json, text};
use rateagg::partition::Partition;
use rateagg::table;
use rateagg::worker::Worker;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli.validate()?;

    match cli.mode {
        ExecutionMode::Aggregate => run_aggregate(cli),
        ExecutionMode::Worker => run_worker(cli),
    }
}

/// Coordinate a full aggregation run
fn run_aggregate(cli: Cli) -> Result<()> {
    use std::time::Instant;

    let start = Instant::now();
    let config = build_config(&cli)?;
    validator::validate_config(&config)?;

    if config.runtime.debug {
        eprintln!(
            "DEBUG: rateagg v{} aggregating {} partition(s), capacity {}",
            env!("CARGO_PKG_VERSION"),
            config.partitions.len(),
            config.table.capacity
        );
    }

    let mut coordinator = Coordinator::new(&config)?;
    let report = coordinator.run()?;

    text::print_report(&report)?;
    if let Some(ref path) = config.output.json {
        json::write_json_report(path, &report)?;
    }

    if config.runtime.debug {
        eprintln!(
            "DEBUG: aggregated {} record(s) in {:.3}s",
            report.total_records,
            start.elapsed().as_secs_f64()
        );
    }
    Ok(())
}

/// Process one partition (spawned by the coordinator)
fn run_worker(cli: Cli) -> Result<()> {
    // validate() guarantees both are present in worker mode
    let table_name = cli.table.as_deref().expect("worker mode has --table");
    let partition = Partition::new(&cli.partitions[0]);

    let table = table::attach_table(table_name)?;
    let worker = Worker::new(cli.worker_id, partition, table);
    let id = worker.id();
    let summary = worker.run()?;

    if cli.debug {
        eprintln!(
            "DEBUG: worker {}: {} record(s), {} malformed, {} out of range",
            id, summary.records, summary.skipped, summary.out_of_range
        );
    }
    Ok(())
}

/// Build configuration from CLI arguments, with an optional TOML base
fn build_config(cli: &Cli) -> Result<Config> {
    let base = match cli.config {
        Some(ref path) => config_toml::parse_toml_file(path)?,
        None => Config {
            table: Default::default(),
            partitions: cli
                .partitions
                .iter()
                .map(|path| PartitionConfig { path: path.clone() })
                .collect(),
            output: Default::default(),
            runtime: Default::default(),
        },
    };

    Ok(config_toml::merge_cli_with_config(cli, base))
}
