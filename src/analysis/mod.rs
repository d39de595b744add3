//! Upload pipeline: validate, compute, store, report.

mod csv_input;
mod error;
mod stats;

pub use csv_input::parse_readings;
pub use error::{AnalysisError, ErrorKind};
pub use stats::summarize;

use log::{error, info};

use crate::{
    db::Database,
    models::{AnalysisSummary, HistoryRecord},
    report,
};

pub const DEFAULT_HISTORY_LIMIT: usize = 5;

#[derive(Clone)]
pub struct AnalysisService {
    db: Database,
    history_limit: usize,
}

impl AnalysisService {
    pub fn new(db: Database, history_limit: usize) -> Self {
        Self { db, history_limit }
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Analyze an uploaded CSV and record it in the bounded history.
    pub async fn submit(
        &self,
        file_name: &str,
        csv: &[u8],
    ) -> Result<AnalysisSummary, AnalysisError> {
        let rows = parse_readings(csv)?;
        let summary = summarize(&rows).ok_or(AnalysisError::EmptyDataset)?;

        let record = self
            .db
            .insert_analysis(file_name, &summary, self.history_limit)
            .await
            .map_err(|err| {
                error!("Failed to store analysis for {file_name}: {err:#}");
                AnalysisError::Store(err)
            })?;

        info!(
            "Analyzed {} ({} rows) as record {}",
            record.file_name, summary.total_count, record.id
        );
        Ok(summary)
    }

    /// Newest first, capped at the retention bound.
    pub async fn history(&self, limit: usize) -> Result<Vec<HistoryRecord>, AnalysisError> {
        self.db
            .most_recent_analyses(limit.min(self.history_limit))
            .await
            .map_err(AnalysisError::Store)
    }

    pub async fn latest(&self) -> Result<Option<HistoryRecord>, AnalysisError> {
        self.db.latest_analysis().await.map_err(AnalysisError::Store)
    }

    /// PDF for the newest record, or the placeholder when nothing is stored.
    pub async fn export_report(&self) -> Result<Vec<u8>, AnalysisError> {
        let latest = self.latest().await?;
        report::render_report(latest.as_ref()).map_err(AnalysisError::Render)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE_CSV: &str = "Temperature,Pressure,Flowrate,Type\n\
                                 20,1,5,Pump\n\
                                 30,2,7,Pump\n\
                                 25,1.5,6,Valve\n";

    fn service() -> (tempfile::TempDir, AnalysisService) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("service.sqlite3")).unwrap();
        (dir, AnalysisService::new(db, DEFAULT_HISTORY_LIMIT))
    }

    #[tokio::test]
    async fn submit_returns_and_stores_summary() {
        let (_dir, service) = service();
        let summary = service
            .submit("reference.csv", REFERENCE_CSV.as_bytes())
            .await
            .unwrap();

        assert_eq!(summary.total_count, 3);
        assert_eq!(summary.averages.temp, 25.0);

        let latest = service.latest().await.unwrap().unwrap();
        assert_eq!(latest.file_name, "reference.csv");
        assert_eq!(latest.summary, summary);
    }

    #[tokio::test]
    async fn missing_pressure_is_a_validation_error() {
        let (_dir, service) = service();
        let err = service
            .submit("bad.csv", b"Temperature,Flowrate,Type\n20,5,Pump\n")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("Pressure"));
        assert!(service.latest().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_dataset_is_rejected_without_storing() {
        let (_dir, service) = service();
        let err = service
            .submit("empty.csv", b"Temperature,Pressure,Flowrate,Type\n")
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::EmptyDataset));
        assert!(service.history(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_is_bounded_and_newest_first() {
        let (_dir, service) = service();
        for i in 1..=6 {
            service
                .submit(&format!("upload{i}.csv"), REFERENCE_CSV.as_bytes())
                .await
                .unwrap();
        }

        let history = service.history(10).await.unwrap();
        assert_eq!(history.len(), DEFAULT_HISTORY_LIMIT);
        assert_eq!(history[0].file_name, "upload6.csv");
        assert!(history.iter().all(|r| r.file_name != "upload1.csv"));
    }

    #[tokio::test]
    async fn report_is_placeholder_when_empty() {
        let (_dir, service) = service();
        let pdf = service.export_report().await.unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }
}
