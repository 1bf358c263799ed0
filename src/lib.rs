//! rateagg - Multi-process ratings aggregation
//!
//! rateagg fans a ratings dataset out to independent worker processes and fans
//! their partial results back into one shared-memory accumulator table, read
//! by the coordinator only after every worker has terminated.
//!
//! # Architecture
//!
//! - **Shared table**: POSIX shared memory (shm_open + mmap) holding one
//!   atomic (sum, count) slot per item
//! - **Worker processes**: one per input partition, spawned as hidden-mode
//!   re-invocations of the own executable
//! - **Coordinator**: allocates, spawns, joins, reports, releases
//! - **Outputs**: per-item average lines on stdout, optional JSON report

pub mod config;
pub mod coordinator;
pub mod output;
pub mod partition;
pub mod table;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use table::SharedTable;

/// Result type used throughout rateagg
pub type Result<T> = anyhow::Result<T>;
