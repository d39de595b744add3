use std::collections::BTreeMap;

use crate::models::{AnalysisSummary, Averages, ReadingRow};

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn mean(rows: &[ReadingRow], column: impl Fn(&ReadingRow) -> f64) -> f64 {
    let sum: f64 = rows.iter().map(column).sum();
    round2(sum / rows.len() as f64)
}

/// Summarize a dataset. Returns `None` for an empty slice, where the
/// averages are undefined.
pub fn summarize(rows: &[ReadingRow]) -> Option<AnalysisSummary> {
    if rows.is_empty() {
        return None;
    }

    let mut distribution = BTreeMap::new();
    for row in rows {
        *distribution.entry(row.equipment_type.clone()).or_insert(0u64) += 1;
    }

    Some(AnalysisSummary {
        total_count: rows.len() as u64,
        averages: Averages {
            temp: mean(rows, |r| r.temperature),
            pressure: mean(rows, |r| r.pressure),
            flowrate: mean(rows, |r| r.flowrate),
        },
        distribution,
    })
}
