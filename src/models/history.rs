//! Stored analyses and their wire representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AnalysisSummary;

const DISPLAY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// A persisted analysis. Owned by the store; callers only get copies.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub id: i64,
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
    pub summary: AnalysisSummary,
}

/// History row as served by `GET /upload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub file_name: String,
    pub uploaded_at: String,
    #[serde(alias = "summary")]
    pub results: AnalysisSummary,
}

impl From<HistoryRecord> for HistoryEntry {
    fn from(record: HistoryRecord) -> Self {
        Self {
            id: record.id,
            file_name: record.file_name,
            uploaded_at: record
                .uploaded_at
                .format(DISPLAY_TIMESTAMP_FORMAT)
                .to_string(),
            results: record.summary,
        }
    }
}
