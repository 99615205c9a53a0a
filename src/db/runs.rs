use crate::db::connection::Database;
use crate::db::StoreError;
use crate::domain::CollectionResult;
use rusqlite::{params, Row};

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionRun {
    pub id: i64,
    pub region_code: String,
    pub region_name: String,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    /// "running", or a `CollectionStatus` label once finished.
    pub status: String,
    pub pages_fetched: Option<i64>,
    pub listings_saved: Option<i64>,
    pub duplicates_dropped: Option<i64>,
    pub records_skipped: Option<i64>,
    pub error_message: Option<String>,
}

impl CollectionRun {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            region_code: row.get(1)?,
            region_name: row.get(2)?,
            started_at: row.get(3)?,
            finished_at: row.get(4)?,
            status: row.get(5)?,
            pages_fetched: row.get(6)?,
            listings_saved: row.get(7)?,
            duplicates_dropped: row.get(8)?,
            records_skipped: row.get(9)?,
            error_message: row.get(10)?,
        })
    }

    pub fn is_partial(&self) -> bool {
        self.status != "complete"
    }
}

const RUN_COLUMNS: &str = "id, region_code, region_name, started_at, finished_at, status, \
     pages_fetched, listings_saved, duplicates_dropped, records_skipped, error_message";

pub fn start_run(
    db: &Database,
    region_code: &str,
    region_name: &str,
    now: i64,
) -> Result<i64, StoreError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO collection_runs (region_code, region_name, started_at, status) \
             VALUES (?1, ?2, ?3, 'running')",
            params![region_code, region_name, now],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

pub fn finish_run(
    db: &Database,
    run_id: i64,
    now: i64,
    result: &CollectionResult,
    saved: usize,
    error: Option<String>,
) -> Result<(), StoreError> {
    let error = error.or_else(|| result.status.describe());
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE collection_runs SET finished_at = ?1, status = ?2, pages_fetched = ?3, \
             listings_saved = ?4, duplicates_dropped = ?5, records_skipped = ?6, \
             error_message = ?7 WHERE id = ?8",
            params![
                now,
                result.status.label(),
                result.pages_fetched,
                saved as i64,
                result.duplicates_dropped as i64,
                result.records_skipped as i64,
                error,
                run_id
            ],
        )?;
        Ok(())
    })
}

/// Marks a run that never produced a collection (e.g. the store write failed).
pub fn fail_run(db: &Database, run_id: i64, now: i64, error: &str) -> Result<(), StoreError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE collection_runs SET finished_at = ?1, status = 'failed', error_message = ?2 \
             WHERE id = ?3",
            params![now, error, run_id],
        )?;
        Ok(())
    })
}

/// The newest run of each region started at or after `since`.
pub fn latest_runs(db: &Database, since: i64) -> Result<Vec<CollectionRun>, StoreError> {
    db.with_conn(|conn| {
        let sql = format!(
            "SELECT {RUN_COLUMNS} FROM collection_runs r \
             WHERE started_at >= ?1 AND id = ( \
                 SELECT MAX(id) FROM collection_runs WHERE region_code = r.region_code \
             ) ORDER BY region_code"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![since], CollectionRun::from_row)?;

        let mut runs = Vec::new();
        for r in rows {
            runs.push(r?);
        }
        Ok(runs)
    })
}

pub fn recent_runs(db: &Database, limit: usize) -> Result<Vec<CollectionRun>, StoreError> {
    db.with_conn(|conn| {
        let sql = format!("SELECT {RUN_COLUMNS} FROM collection_runs ORDER BY id DESC LIMIT ?1");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], CollectionRun::from_row)?;

        let mut runs = Vec::new();
        for r in rows {
            runs.push(r?);
        }
        Ok(runs)
    })
}
