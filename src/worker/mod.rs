//! Worker process implementation
//!
//! Each worker consumes exactly one partition: it attaches to the shared
//! accumulator table by name, streams its input file line by line, and
//! applies one atomic increment per valid record. Workers only ever write
//! to the table - final averages are the coordinator's business.
//!
//! Parse failures are absorbed here and never surface to the coordinator;
//! failure to open the partition at all is fatal to the worker, and the
//! coordinator observes it as a nonzero status at join time.

pub mod launcher;

use crate::partition::{Partition, RatingRecord};
use crate::table::SharedTable;
use crate::Result;
use std::io::BufRead;

/// Per-worker processing counters
///
/// The coordinator's contract only consumes the worker's exit status; these
/// counters feed debug output and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Valid records applied to the table
    pub records: u64,
    /// Malformed lines skipped
    pub skipped: u64,
    /// Well-formed records whose item identifier maps outside the table
    pub out_of_range: u64,
}

/// Worker bound to one partition and one attached table
pub struct Worker {
    id: usize,
    partition: Partition,
    table: SharedTable,
}

impl Worker {
    pub fn new(id: usize, partition: Partition, table: SharedTable) -> Self {
        Self {
            id,
            partition,
            table,
        }
    }

    /// Worker id (for identification in diagnostics)
    pub fn id(&self) -> usize {
        self.id
    }

    /// Process the partition to completion
    ///
    /// For each line: parse four tab-separated integers, map `item_id - 1`
    /// into the table, and increment. Malformed lines and out-of-range item
    /// identifiers are counted and skipped. Reaching end of input is
    /// success.
    ///
    /// # Errors
    ///
    /// Returns an error only for conditions that are not recoverable
    /// locally: the partition cannot be opened, or reading from it fails
    /// mid-stream.
    pub fn run(mut self) -> Result<WorkerSummary> {
        let reader = self.partition.open()?;
        let mut summary = WorkerSummary::default();

        for line in reader.lines() {
            let line = line?;
            match RatingRecord::parse(&line) {
                Some(record) => self.apply(&record, &mut summary),
                None => {
                    if !line.is_empty() {
                        summary.skipped += 1;
                    }
                }
            }
        }

        // Detach this worker's view; the coordinator owns the final unlink
        self.table.release();
        Ok(summary)
    }

    fn apply(&self, record: &RatingRecord, summary: &mut WorkerSummary) {
        // Item identifiers are 1-based in the input
        let index = record.item_id - 1;
        if index < 0 || index as u64 >= self.table.capacity() {
            summary.out_of_range += 1;
            return;
        }
        // In range, so the increment cannot fail
        self.table
            .increment(index as u64, record.rating)
            .expect("index checked against capacity");
        summary.records += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::SlotValue;
    use std::io::Write;
    use std::sync::atomic::{AtomicU32, Ordering};

    static NAME_SEQ: AtomicU32 = AtomicU32::new(0);

    fn test_name(tag: &str) -> String {
        format!(
            "/rateagg-wtest-{}-{}-{}",
            tag,
            std::process::id(),
            NAME_SEQ.fetch_add(1, Ordering::Relaxed)
        )
    }

    fn write_partition(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_worker_aggregates_partition() {
        let name = test_name("agg");
        let table = SharedTable::create(&name, 10).unwrap();
        let file = write_partition(&["1\t5\t4\t100", "2\t5\t2\t101", "3\t1\t5\t102"]);

        let view = SharedTable::attach(&name).unwrap();
        let worker = Worker::new(0, Partition::new(file.path()), view);
        let summary = worker.run().unwrap();

        assert_eq!(
            summary,
            WorkerSummary {
                records: 3,
                skipped: 0,
                out_of_range: 0
            }
        );
        let slots = table.read_all();
        assert_eq!(slots[4], SlotValue { sum: 6, count: 2 });
        assert_eq!(slots[0], SlotValue { sum: 5, count: 1 });
    }

    #[test]
    fn test_worker_skips_malformed_lines() {
        let name = test_name("skip");
        let table = SharedTable::create(&name, 10).unwrap();
        let file = write_partition(&["1\t5\t4\t100", "garbage line", "7\t3"]);

        let view = SharedTable::attach(&name).unwrap();
        let summary = Worker::new(0, Partition::new(file.path()), view)
            .run()
            .unwrap();

        // Only the well-formed record lands; the worker still succeeds
        assert_eq!(summary.records, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(table.read_all()[4], SlotValue { sum: 4, count: 1 });
    }

    #[test]
    fn test_worker_counts_out_of_range_items() {
        let name = test_name("range");
        let table = SharedTable::create(&name, 4).unwrap();
        // item 99 maps outside capacity 4; item 0 maps to index -1
        let file = write_partition(&["1\t99\t5\t100", "1\t0\t5\t100", "1\t4\t3\t100"]);

        let view = SharedTable::attach(&name).unwrap();
        let summary = Worker::new(0, Partition::new(file.path()), view)
            .run()
            .unwrap();

        assert_eq!(summary.records, 1);
        assert_eq!(summary.out_of_range, 2);
        assert_eq!(table.read_all()[3], SlotValue { sum: 3, count: 1 });
    }

    #[test]
    fn test_worker_missing_partition_fails() {
        let name = test_name("missing");
        let _table = SharedTable::create(&name, 4).unwrap();

        let view = SharedTable::attach(&name).unwrap();
        let worker = Worker::new(0, Partition::new("/nonexistent/part-0.txt"), view);
        assert!(worker.run().is_err());
    }

    #[test]
    fn test_worker_empty_partition_succeeds() {
        let name = test_name("empty");
        let table = SharedTable::create(&name, 4).unwrap();
        let file = write_partition(&[]);

        let view = SharedTable::attach(&name).unwrap();
        let summary = Worker::new(0, Partition::new(file.path()), view)
            .run()
            .unwrap();

        assert_eq!(summary, WorkerSummary::default());
        assert!(table.read_all().iter().all(|s| s.count == 0));
    }
}
