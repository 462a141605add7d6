//! Persisted enable flags and last-run times for configured jobs.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStateRow {
    pub job_id: String,
    pub enabled: bool,
    pub last_run: Option<String>,
    pub updated_at: String,
}

impl JobStateRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            job_id: row.get("job_id")?,
            enabled: row.get("enabled")?,
            last_run: row.get("last_run")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts or replaces the state of one job.
pub fn upsert(db: &Database, state: &JobStateRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO job_state (job_id, enabled, last_run, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(job_id) DO UPDATE SET
                enabled = excluded.enabled,
                last_run = excluded.last_run,
                updated_at = excluded.updated_at",
            params![state.job_id, state.enabled, state.last_run, state.updated_at],
        )?;
        Ok(())
    })
}

/// Returns every stored job state.
pub fn load_all(db: &Database) -> Result<Vec<JobStateRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM job_state ORDER BY job_id")?;
        let rows = stmt
            .query_map([], JobStateRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
