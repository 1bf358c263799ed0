//! Input partitions and record parsing
//!
//! A partition is an immutable slice of the input dataset: one file, assigned
//! to exactly one worker. Records are tab-separated integer quadruples, one
//! per line:
//!
//! ```text
//! userId\tmovieId\trating\ttimestamp
//! ```
//!
//! There is no header row. Lines that do not parse as exactly four integers
//! are malformed; the worker skips them and keeps going.

use anyhow::Context;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// One parsed ratings record
///
/// Transient - consumed immediately by the worker, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingRecord {
    pub user_id: i64,
    pub item_id: i64,
    pub rating: i64,
    pub timestamp: i64,
}

impl RatingRecord {
    /// Parse one input line
    ///
    /// Returns `None` for malformed lines: wrong field count, or any field
    /// that is not an integer. Malformed lines are recoverable by contract -
    /// the caller skips them and continues the partition.
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split('\t');
        let user_id = fields.next()?.trim().parse().ok()?;
        let item_id = fields.next()?.trim().parse().ok()?;
        let rating = fields.next()?.trim().parse().ok()?;
        let timestamp = fields.next()?.trim().parse().ok()?;
        if fields.next().is_some() {
            return None;
        }
        Some(Self {
            user_id,
            item_id,
            rating,
            timestamp,
        })
    }
}

/// A worker-assigned slice of input: one file path, read-only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    path: PathBuf,
}

impl Partition {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the partition for line-by-line reading
    ///
    /// # Errors
    ///
    /// Failure to open is not recoverable locally - the worker terminates
    /// with a failure status and the coordinator aborts the run at join.
    pub fn open(&self) -> crate::Result<BufReader<File>> {
        let file = File::open(&self.path)
            .with_context(|| format!("cannot open partition {}", self.path.display()))?;
        Ok(BufReader::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_valid_record() {
        let record = RatingRecord::parse("196\t242\t3\t881250949").unwrap();
        assert_eq!(
            record,
            RatingRecord {
                user_id: 196,
                item_id: 242,
                rating: 3,
                timestamp: 881250949,
            }
        );
    }

    #[test]
    fn test_parse_negative_fields() {
        // All fields are plain integers; signs are legal
        let record = RatingRecord::parse("1\t2\t-1\t0").unwrap();
        assert_eq!(record.rating, -1);
    }

    #[test]
    fn test_parse_rejects_short_line() {
        assert!(RatingRecord::parse("196\t242\t3").is_none());
        assert!(RatingRecord::parse("196").is_none());
        assert!(RatingRecord::parse("").is_none());
    }

    #[test]
    fn test_parse_rejects_extra_fields() {
        assert!(RatingRecord::parse("196\t242\t3\t881250949\t7").is_none());
    }

    #[test]
    fn test_parse_rejects_non_integer() {
        assert!(RatingRecord::parse("196\t242\tthree\t881250949").is_none());
        assert!(RatingRecord::parse("a\tb\tc\td").is_none());
        assert!(RatingRecord::parse("1.5\t2\t3\t4").is_none());
    }

    #[test]
    fn test_parse_tolerates_trailing_whitespace() {
        // Lines read with BufRead::lines keep a trailing '\r' on CRLF input
        let record = RatingRecord::parse("196\t242\t3\t881250949\r").unwrap();
        assert_eq!(record.timestamp, 881250949);
    }

    #[test]
    fn test_partition_open_missing() {
        let partition = Partition::new("/nonexistent/ratings.txt");
        assert!(partition.open().is_err());
    }

    #[test]
    fn test_partition_open_reads_lines() {
        use std::io::BufRead;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1\t5\t4\t100").unwrap();
        writeln!(file, "2\t5\t2\t101").unwrap();

        let partition = Partition::new(file.path());
        let reader = partition.open().unwrap();
        let lines: Vec<String> = reader.lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert!(RatingRecord::parse(&lines[0]).is_some());
    }
}
