//! Worker spawning
//!
//! The coordinator launches workers through the `WorkerLauncher` trait so the
//! spawn mechanism is a seam: production uses `ProcessLauncher`, which
//! re-invokes the own executable in the hidden worker mode, and tests drive
//! the coordinator with an in-process launcher instead.

use crate::Result;
use anyhow::Context;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

/// Everything a launcher needs to start one worker
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    /// Worker id, also used to label failures at join time
    pub id: usize,
    /// Input file assigned to this worker
    pub partition: PathBuf,
    /// Shared-memory object name of the accumulator table
    pub table_name: String,
    /// Forward --debug to the worker process
    pub debug: bool,
}

/// Terminal status of a worker, observed at join time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    Success,
    /// Nonzero or signal exit; `code` is None when killed by a signal
    Failure { code: Option<i32> },
}

/// Handle to a launched worker
///
/// `join()` is the only way to learn the outcome - there is no mid-run
/// cancellation; a failed worker is discovered when the coordinator joins.
pub trait WorkerHandle: Send {
    /// Worker id this handle belongs to
    fn id(&self) -> usize;

    /// Block until the worker terminates and report its outcome
    fn join(&mut self) -> Result<WorkerOutcome>;

    /// Kill the worker without collecting a result
    ///
    /// Only used to reap already-spawned siblings when a later spawn fails;
    /// best effort, errors are reported as warnings by the implementation.
    fn terminate(&mut self);
}

/// Launches one worker per partition
pub trait WorkerLauncher {
    fn launch(&self, spec: &WorkerSpec) -> Result<Box<dyn WorkerHandle>>;
}

/// Production launcher: one OS process per worker
///
/// Spawns the own executable with the hidden worker-mode arguments. Worker
/// stdout is closed (the coordinator owns stdout for the report); stderr is
/// inherited so worker warnings reach the operator.
pub struct ProcessLauncher {
    exe: PathBuf,
}

impl ProcessLauncher {
    pub fn new() -> Result<Self> {
        let exe = std::env::current_exe().context("cannot resolve own executable path")?;
        Ok(Self { exe })
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(&self, spec: &WorkerSpec) -> Result<Box<dyn WorkerHandle>> {
        let mut cmd = Command::new(&self.exe);
        cmd.arg("--mode")
            .arg("worker")
            .arg("--table")
            .arg(&spec.table_name)
            .arg("--worker-id")
            .arg(spec.id.to_string())
            .arg(&spec.partition)
            .stdin(Stdio::null())
            .stdout(Stdio::null());
        if spec.debug {
            cmd.arg("--debug");
        }

        let child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn worker {}", spec.id))?;

        Ok(Box::new(ProcessHandle { id: spec.id, child }))
    }
}

/// Handle wrapping a worker child process
struct ProcessHandle {
    id: usize,
    child: Child,
}

impl WorkerHandle for ProcessHandle {
    fn id(&self) -> usize {
        self.id
    }

    fn join(&mut self) -> Result<WorkerOutcome> {
        let status = self
            .child
            .wait()
            .with_context(|| format!("failed to join worker {}", self.id))?;
        if status.success() {
            Ok(WorkerOutcome::Success)
        } else {
            Ok(WorkerOutcome::Failure {
                code: status.code(),
            })
        }
    }

    fn terminate(&mut self) {
        if let Err(e) = self.child.kill() {
            eprintln!("Warning: failed to kill worker {}: {}", self.id, e);
        }
        if let Err(e) = self.child.wait() {
            eprintln!("Warning: failed to reap worker {}: {}", self.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_carries_partition() {
        let spec = WorkerSpec {
            id: 3,
            partition: PathBuf::from("ratings-part-3.txt"),
            table_name: "/rateagg-test".to_string(),
            debug: false,
        };
        assert_eq!(spec.id, 3);
        assert_eq!(spec.partition, PathBuf::from("ratings-part-3.txt"));
    }

    #[test]
    fn test_outcome_equality() {
        assert_eq!(WorkerOutcome::Success, WorkerOutcome::Success);
        assert_ne!(
            WorkerOutcome::Success,
            WorkerOutcome::Failure { code: Some(1) }
        );
    }
}
