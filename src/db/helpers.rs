use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::AnalysisSummary;

/// Fixed-width RFC 3339 so that lexical order in SQLite matches time order.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn to_i64(value: usize) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn encode_summary(summary: &AnalysisSummary) -> Result<String> {
    serde_json::to_string(summary).context("failed to encode analysis summary")
}

pub fn decode_summary(raw: &str) -> Result<AnalysisSummary> {
    serde_json::from_str(raw).context("failed to decode stored analysis summary")
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn timestamps_have_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let fractional = whole + chrono::Duration::microseconds(1_500);

        let a = format_timestamp(&whole);
        let b = format_timestamp(&fractional);
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(parse_datetime(&b, "uploaded_at").unwrap(), fractional);
    }
}
