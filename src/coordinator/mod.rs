//! Coordinator: fan-out, barrier, fan-in
//!
//! The coordinator drives one whole aggregation run:
//!
//! 1. allocate the shared accumulator table
//! 2. spawn one worker per partition, each bound to the table by name
//! 3. join every worker (the barrier - all joins complete before any read)
//! 4. read the now-stable table and compute per-item averages
//! 5. release the shared memory
//!
//! Any worker failure aborts the whole run: the table is released and no
//! partial report is produced. The coordinator is single-threaded; the join
//! barrier is its only suspension point. There is no mid-run cancellation -
//! a failed worker is discovered at join time while its siblings run to
//! completion.

use crate::config::Config;
use crate::output::{build_report, Report};
use crate::partition::Partition;
use crate::table::SharedTable;
use crate::worker::launcher::{
    ProcessLauncher, WorkerHandle, WorkerLauncher, WorkerOutcome, WorkerSpec,
};
use crate::Result;
use anyhow::Context;
use thiserror::Error;

/// Coordinator-level failures
///
/// Allocation failures surface as `table::TableError`; these two cover the
/// spawn and join legs of the run.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("failed to spawn worker {worker}: {cause}")]
    Spawn { worker: usize, cause: anyhow::Error },

    #[error("worker {worker} terminated with failure status {code:?}")]
    WorkerFailure { worker: usize, code: Option<i32> },
}

/// Run phases, in order; `Aborted` is terminal and reachable from
/// `Allocated` or `Running`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Init,
    Allocated,
    Running,
    Joined,
    Reported,
    Released,
    Aborted,
}

/// Orchestrates one aggregation run
pub struct Coordinator {
    capacity: u64,
    partitions: Vec<Partition>,
    table_name: String,
    debug: bool,
    launcher: Box<dyn WorkerLauncher>,
    state: CoordinatorState,
}

impl Coordinator {
    /// Create a coordinator that spawns real worker processes
    pub fn new(config: &Config) -> Result<Self> {
        let launcher = ProcessLauncher::new()?;
        Ok(Self::with_launcher(config, Box::new(launcher)))
    }

    /// Create a coordinator with a custom launcher (used by tests)
    pub fn with_launcher(config: &Config, launcher: Box<dyn WorkerLauncher>) -> Self {
        Self {
            capacity: config.table.capacity,
            partitions: config
                .partitions
                .iter()
                .map(|p| Partition::new(&p.path))
                .collect(),
            table_name: config.effective_table_name(),
            debug: config.runtime.debug,
            launcher,
            state: CoordinatorState::Init,
        }
    }

    /// Current phase of the run
    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Shared-memory object name this run uses
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Execute the full run and return the final report
    ///
    /// On success the table has been read, reduced to averages, and
    /// released. On any error the table is guaranteed released as well - by
    /// the explicit abort paths here, or by `SharedTable`'s drop for paths
    /// that unwind past them.
    ///
    /// # Errors
    ///
    /// `table::TableError::Allocation` if the shared table cannot be
    /// created; `CoordinatorError::Spawn` if a worker cannot be started;
    /// `CoordinatorError::WorkerFailure` if any worker's terminal status is
    /// a failure. No partial report is ever produced.
    pub fn run(&mut self) -> Result<Report> {
        let mut table = match SharedTable::create(&self.table_name, self.capacity) {
            Ok(table) => table,
            Err(e) => {
                // Nothing acquired, nothing to release
                self.enter(CoordinatorState::Aborted);
                return Err(e).context("cannot allocate accumulator table");
            }
        };
        self.enter(CoordinatorState::Allocated);

        let mut handles = match self.spawn_workers() {
            Ok(handles) => handles,
            Err(e) => {
                table.release();
                self.enter(CoordinatorState::Aborted);
                return Err(e);
            }
        };
        self.enter(CoordinatorState::Running);

        if let Err(e) = self.join_workers(&mut handles) {
            table.release();
            self.enter(CoordinatorState::Aborted);
            return Err(e);
        }
        self.enter(CoordinatorState::Joined);

        // All workers have terminated: the table is stable from here on
        let slots = table.read_all();
        let report = build_report(
            &slots,
            self.partitions.iter().map(|p| p.path().to_path_buf()),
        );
        self.enter(CoordinatorState::Reported);

        table.release();
        self.enter(CoordinatorState::Released);
        Ok(report)
    }

    /// Fan-out: one worker per partition
    ///
    /// A spawn failure terminates the siblings spawned so far, so no orphan
    /// process keeps the mapping alive past the abort.
    fn spawn_workers(&self) -> Result<Vec<Box<dyn WorkerHandle>>> {
        let mut handles: Vec<Box<dyn WorkerHandle>> = Vec::with_capacity(self.partitions.len());

        for (id, partition) in self.partitions.iter().enumerate() {
            let spec = WorkerSpec {
                id,
                partition: partition.path().to_path_buf(),
                table_name: self.table_name.clone(),
                debug: self.debug,
            };
            match self.launcher.launch(&spec) {
                Ok(handle) => {
                    if self.debug {
                        eprintln!(
                            "DEBUG: spawned worker {} for {}",
                            id,
                            partition.path().display()
                        );
                    }
                    handles.push(handle);
                }
                Err(cause) => {
                    for sibling in handles.iter_mut() {
                        sibling.terminate();
                    }
                    return Err(CoordinatorError::Spawn { worker: id, cause }.into());
                }
            }
        }

        Ok(handles)
    }

    /// Barrier: join every worker before the table is read
    ///
    /// All joins complete even when an early worker reports failure; the
    /// first failure is then returned. Join order does not affect
    /// correctness.
    fn join_workers(&self, handles: &mut [Box<dyn WorkerHandle>]) -> Result<()> {
        let mut first_failure: Option<CoordinatorError> = None;

        for handle in handles.iter_mut() {
            match handle.join() {
                Ok(WorkerOutcome::Success) => {
                    if self.debug {
                        eprintln!("DEBUG: worker {} completed", handle.id());
                    }
                }
                Ok(WorkerOutcome::Failure { code }) => {
                    eprintln!(
                        "Warning: worker {} failed with status {:?}",
                        handle.id(),
                        code
                    );
                    first_failure.get_or_insert(CoordinatorError::WorkerFailure {
                        worker: handle.id(),
                        code,
                    });
                }
                Err(e) => {
                    eprintln!("Warning: could not join worker {}: {}", handle.id(), e);
                    first_failure.get_or_insert(CoordinatorError::WorkerFailure {
                        worker: handle.id(),
                        code: None,
                    });
                }
            }
        }

        match first_failure {
            Some(failure) => Err(failure.into()),
            None => Ok(()),
        }
    }

    fn enter(&mut self, state: CoordinatorState) {
        if self.debug {
            eprintln!("DEBUG: coordinator {:?} -> {:?}", self.state, state);
        }
        self.state = state;
    }
}
