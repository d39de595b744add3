//! Equipment readings and the statistics computed from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One parsed CSV row.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingRow {
    pub temperature: f64,
    pub pressure: f64,
    pub flowrate: f64,
    pub equipment_type: String,
}

impl ReadingRow {
    #[cfg(test)]
    pub(crate) fn new(temperature: f64, pressure: f64, flowrate: f64, equipment_type: &str) -> Self {
        Self {
            temperature,
            pressure,
            flowrate,
            equipment_type: equipment_type.to_string(),
        }
    }
}

/// Column means, rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Averages {
    pub temp: f64,
    pub pressure: f64,
    pub flowrate: f64,
}

/// Statistics for one uploaded dataset.
///
/// Values in `distribution` always sum to `total_count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_count: u64,
    pub averages: Averages,
    pub distribution: BTreeMap<String, u64>,
}
