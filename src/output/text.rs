//! Human-readable text output

use crate::output::Report;
use crate::Result;
use std::io::Write;

/// Write the per-item listing: one line per index, ascending
///
/// The format is fixed: `ITEM <index> has <avg> rating`, with the average
/// rendered to exactly three decimal digits and `0.000` for items that had
/// no contributing records.
pub fn write_report<W: Write>(out: &mut W, report: &Report) -> Result<()> {
    for item in &report.items {
        writeln!(out, "ITEM {} has {:.3} rating", item.index, item.avg)?;
    }
    Ok(())
}

/// Print the report to stdout
pub fn print_report(report: &Report) -> Result<()> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    write_report(&mut lock, report)?;
    lock.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::build_report;
    use crate::table::SlotValue;

    fn render(slots: &[SlotValue]) -> String {
        let report = build_report(slots, std::iter::empty());
        let mut buf = Vec::new();
        write_report(&mut buf, &report).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_line_format() {
        let out = render(&[SlotValue { sum: 6, count: 2 }]);
        assert_eq!(out, "ITEM 0 has 3.000 rating\n");
    }

    #[test]
    fn test_empty_item_renders_zero() {
        let out = render(&[SlotValue { sum: 0, count: 0 }]);
        assert_eq!(out, "ITEM 0 has 0.000 rating\n");
    }

    #[test]
    fn test_three_decimal_rounding() {
        // 10 / 3 = 3.333..., 2 / 3 = 0.666... -> 0.667
        let out = render(&[
            SlotValue { sum: 10, count: 3 },
            SlotValue { sum: 2, count: 3 },
        ]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "ITEM 0 has 3.333 rating");
        assert_eq!(lines[1], "ITEM 1 has 0.667 rating");
    }

    #[test]
    fn test_one_line_per_slot() {
        let slots = vec![SlotValue { sum: 0, count: 0 }; 42];
        let out = render(&slots);
        assert_eq!(out.lines().count(), 42);
        for (i, line) in out.lines().enumerate() {
            assert!(line.starts_with(&format!("ITEM {} ", i)));
        }
    }
}
