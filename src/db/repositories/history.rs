use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::{params, Row, Transaction};

use crate::{
    db::{
        connection::Database,
        helpers::{decode_summary, encode_summary, format_timestamp, parse_datetime, to_i64},
    },
    models::{AnalysisSummary, HistoryRecord},
};

const SELECT_COLUMNS: &str = "SELECT id, file_name, uploaded_at, summary FROM analyses";
const NEWEST_FIRST: &str = "ORDER BY uploaded_at DESC, id DESC";
const LAST_INSERTED_FIRST: &str = "ORDER BY id DESC";

/// The current time, or the newest stored upload time when the clock is
/// behind it.
fn next_upload_time(tx: &Transaction<'_>) -> Result<DateTime<Utc>> {
    let mut stmt = tx.prepare("SELECT uploaded_at FROM analyses")?;
    let mut rows = stmt.query([])?;
    let mut stamp = Utc::now();
    while let Some(row) = rows.next()? {
        let stored: String = row.get(0)?;
        let stored = parse_datetime(&stored, "uploaded_at")?;
        if stored > stamp {
            debug!("Clock is behind stored upload {stored}; reusing its timestamp");
            stamp = stored;
        }
    }
    Ok(stamp)
}

fn row_to_record(row: &Row) -> Result<HistoryRecord> {
    let uploaded_at: String = row.get("uploaded_at")?;
    let summary: String = row.get("summary")?;

    Ok(HistoryRecord {
        id: row.get("id")?,
        file_name: row.get("file_name")?,
        uploaded_at: parse_datetime(&uploaded_at, "uploaded_at")?,
        summary: decode_summary(&summary)?,
    })
}

impl Database {
    /// Store a new analysis and evict everything but the `keep` most recently
    /// inserted records, in one transaction.
    pub async fn insert_analysis(
        &self,
        file_name: &str,
        summary: &AnalysisSummary,
        keep: usize,
    ) -> Result<HistoryRecord> {
        if keep == 0 {
            return Err(anyhow!("history must retain at least one record"));
        }

        let file_name = file_name.to_string();
        let summary = summary.clone();
        let encoded = encode_summary(&summary)?;
        let keep = to_i64(keep)?;

        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let uploaded_at = next_upload_time(&tx)?;

            tx.execute(
                "INSERT INTO analyses (file_name, uploaded_at, summary) VALUES (?1, ?2, ?3)",
                params![file_name, format_timestamp(&uploaded_at), encoded],
            )?;
            let id = tx.last_insert_rowid();

            let evicted = tx.execute(
                &format!(
                    "DELETE FROM analyses
                     WHERE id NOT IN (SELECT id FROM analyses {LAST_INSERTED_FIRST} LIMIT ?1)"
                ),
                params![keep],
            )?;

            tx.commit()?;

            if evicted > 0 {
                info!("Evicted {evicted} analysis record(s) beyond the newest {keep}");
            }
            debug!("Stored analysis {id} for {file_name}");

            Ok(HistoryRecord {
                id,
                file_name,
                uploaded_at: parse_datetime(&format_timestamp(&uploaded_at), "uploaded_at")?,
                summary,
            })
        })
        .await
    }

    /// Newest first; returns fewer than `limit` when the store is smaller.
    pub async fn most_recent_analyses(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        let limit = to_i64(limit)?;
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} {NEWEST_FIRST} LIMIT ?1"))?;

            let mut rows = stmt.query(params![limit])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }

            Ok(records)
        })
        .await
    }

    pub async fn latest_analysis(&self) -> Result<Option<HistoryRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} {NEWEST_FIRST} LIMIT 1"))?;

            let mut rows = stmt.query([])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_record(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    #[cfg(test)]
    pub(crate) async fn count_analyses(&self) -> Result<usize> {
        self.execute(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM analyses", [], |row| row.get(0))?;
            Ok(usize::try_from(count)?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::TimeZone;
    use tokio::task::JoinSet;

    use super::*;
    use crate::models::Averages;

    const KEEP: usize = 5;

    fn summary(total: u64) -> AnalysisSummary {
        AnalysisSummary {
            total_count: total,
            averages: Averages {
                temp: 20.0,
                pressure: 1.0,
                flowrate: 5.0,
            },
            distribution: BTreeMap::from([("Pump".to_string(), total)]),
        }
    }

    fn open() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("history.sqlite3")).unwrap();
        (dir, db)
    }

    /// Writes rows with fixed timestamps, bypassing `insert_analysis`.
    async fn seed(db: &Database, rows: Vec<(String, DateTime<Utc>)>) {
        let encoded = encode_summary(&summary(1)).unwrap();
        db.execute(move |conn| {
            for (file_name, uploaded_at) in rows {
                conn.execute(
                    "INSERT INTO analyses (file_name, uploaded_at, summary) VALUES (?1, ?2, ?3)",
                    params![file_name, format_timestamp(&uploaded_at), encoded],
                )?;
            }
            Ok(())
        })
        .await
        .unwrap();
    }

    fn names(records: &[HistoryRecord]) -> Vec<&str> {
        records.iter().map(|r| r.file_name.as_str()).collect()
    }

    #[tokio::test]
    async fn latest_is_none_on_empty_store() {
        let (_dir, db) = open();
        assert!(db.latest_analysis().await.unwrap().is_none());
        assert!(db.most_recent_analyses(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn insert_returns_stored_record() {
        let (_dir, db) = open();
        let record = db.insert_analysis("a.csv", &summary(3), KEEP).await.unwrap();

        let latest = db.latest_analysis().await.unwrap().unwrap();
        assert_eq!(latest, record);
        assert_eq!(latest.summary.total_count, 3);
    }

    #[tokio::test]
    async fn sixth_insert_evicts_oldest() {
        let (_dir, db) = open();
        for i in 1..=6 {
            db.insert_analysis(&format!("file{i}.csv"), &summary(i), KEEP)
                .await
                .unwrap();
        }

        let records = db.most_recent_analyses(10).await.unwrap();
        let names: Vec<_> = records.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(
            names,
            ["file6.csv", "file5.csv", "file4.csv", "file3.csv", "file2.csv"]
        );
        assert_eq!(db.count_analyses().await.unwrap(), KEEP);
        assert_eq!(db.latest_analysis().await.unwrap().unwrap().file_name, "file6.csv");
    }

    #[tokio::test]
    async fn most_recent_respects_limit() {
        let (_dir, db) = open();
        for i in 1..=3 {
            db.insert_analysis(&format!("file{i}.csv"), &summary(i), KEEP)
                .await
                .unwrap();
        }

        let records = db.most_recent_analyses(2).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].file_name, "file3.csv");
        assert!(records[0].id > records[1].id);
    }

    #[tokio::test]
    async fn concurrent_inserts_never_exceed_bound() {
        let (_dir, db) = open();
        let mut tasks = JoinSet::new();
        for i in 0..20 {
            let db = db.clone();
            tasks.spawn(async move {
                db.insert_analysis(&format!("file{i}.csv"), &summary(i), KEEP)
                    .await
                    .unwrap();
                db.count_analyses().await.unwrap()
            });
        }

        while let Some(count) = tasks.join_next().await {
            let count = count.unwrap();
            assert!((1..=KEEP).contains(&count));
        }
        assert_eq!(db.count_analyses().await.unwrap(), KEEP);
    }

    #[tokio::test]
    async fn equal_timestamps_fall_back_to_insertion_order() {
        let (_dir, db) = open();
        let stamp = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        seed(&db, (0..5).map(|i| (format!("same{i}.csv"), stamp)).collect()).await;

        let records = db.most_recent_analyses(10).await.unwrap();
        assert_eq!(
            names(&records),
            ["same4.csv", "same3.csv", "same2.csv", "same1.csv", "same0.csv"]
        );

        db.insert_analysis("next.csv", &summary(2), KEEP).await.unwrap();
        let records = db.most_recent_analyses(10).await.unwrap();
        assert_eq!(
            names(&records),
            ["next.csv", "same4.csv", "same3.csv", "same2.csv", "same1.csv"]
        );
    }

    #[tokio::test]
    async fn upload_survives_clock_behind_stored_records() {
        let (_dir, db) = open();
        let future = |second| Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, second).unwrap();
        seed(&db, (0..5).map(|i| (format!("old{i}.csv"), future(i))).collect()).await;

        let record = db.insert_analysis("new.csv", &summary(2), KEEP).await.unwrap();
        assert_eq!(record.uploaded_at, future(4));

        let records = db.most_recent_analyses(10).await.unwrap();
        assert_eq!(
            names(&records),
            ["new.csv", "old4.csv", "old3.csv", "old2.csv", "old1.csv"]
        );
        assert_eq!(db.latest_analysis().await.unwrap().unwrap(), record);
    }

    #[tokio::test]
    async fn zero_retention_is_rejected() {
        let (_dir, db) = open();
        assert!(db.insert_analysis("a.csv", &summary(1), 0).await.is_err());
        assert_eq!(db.count_analyses().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.sqlite3");
        {
            let db = Database::new(path.clone()).unwrap();
            db.insert_analysis("kept.csv", &summary(2), KEEP).await.unwrap();
        }

        let db = Database::new(path).unwrap();
        let latest = db.latest_analysis().await.unwrap().unwrap();
        assert_eq!(latest.file_name, "kept.csv");
    }
}
