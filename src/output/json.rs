//! JSON report output
//!
//! Machine-readable companion to the stdout listing, written to a file when
//! requested. Carries the same per-item aggregates plus a generation
//! timestamp, so runs can be archived and diffed.

use crate::output::Report;
use crate::Result;
use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// On-disk report envelope
#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    /// RFC 3339 generation time, UTC
    generated: String,
    #[serde(flatten)]
    report: &'a Report,
}

/// Write the report as pretty-printed JSON to `path`
pub fn write_json_report(path: &Path, report: &Report) -> Result<()> {
    let envelope = JsonReport {
        generated: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        report,
    };

    let file = File::create(path)
        .with_context(|| format!("cannot create JSON report {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &envelope)
        .with_context(|| format!("cannot serialize JSON report {}", path.display()))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::build_report;
    use crate::table::SlotValue;

    #[test]
    fn test_json_report_round_trips() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        let report = build_report(
            &[
                SlotValue { sum: 6, count: 2 },
                SlotValue { sum: 0, count: 0 },
            ],
            std::iter::once("part-0.txt".into()),
        );

        write_json_report(&path, &report).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["capacity"], 2);
        assert_eq!(value["total_records"], 2);
        assert_eq!(value["items"][0]["avg"], 3.0);
        assert!(value["generated"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_json_report_bad_path_fails() {
        let report = build_report(&[], std::iter::empty());
        let path = Path::new("/nonexistent-dir/report.json");
        assert!(write_json_report(path, &report).is_err());
    }
}
