//! Result reporting
//!
//! The coordinator reduces the post-barrier table snapshot into a `Report`;
//! the renderers here turn that into the stdout listing and, optionally, a
//! JSON file.

pub mod json;
pub mod text;

use crate::table::SlotValue;
use serde::Serialize;
use std::path::PathBuf;

/// Final per-item aggregate
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ItemAverage {
    pub index: u64,
    pub sum: i64,
    pub count: u64,
    pub avg: f64,
}

/// Outcome of one full aggregation run
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Table capacity; `items.len()` always equals this
    pub capacity: u64,
    /// Partitions that contributed, in worker-id order
    pub partitions: Vec<PathBuf>,
    /// Valid records aggregated across all partitions
    pub total_records: u64,
    /// One entry per index, ascending, no gaps
    pub items: Vec<ItemAverage>,
}

/// Reduce a table snapshot to per-item averages
///
/// Empty slots average to exactly 0.0 rather than NaN.
pub fn build_report(
    slots: &[SlotValue],
    partitions: impl IntoIterator<Item = PathBuf>,
) -> Report {
    let items: Vec<ItemAverage> = slots
        .iter()
        .enumerate()
        .map(|(index, slot)| ItemAverage {
            index: index as u64,
            sum: slot.sum,
            count: slot.count,
            avg: if slot.count > 0 {
                slot.sum as f64 / slot.count as f64
            } else {
                0.0
            },
        })
        .collect();
    let total_records = items.iter().map(|item| item.count).sum();

    Report {
        capacity: slots.len() as u64,
        partitions: partitions.into_iter().collect(),
        total_records,
        items,
    }
}
