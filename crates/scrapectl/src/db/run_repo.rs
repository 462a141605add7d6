//! Run history, one row per dispatched work unit.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError, Subject};

/// A raw run row from the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRow {
    pub id: String,
    pub job_id: String,
    pub scraper: String,
    pub mode: String,
    pub since: Option<String>,
    pub status: String,
    pub error: Option<String>,
    pub queued_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

impl RunRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            scraper: row.get("scraper")?,
            mode: row.get("mode")?,
            since: row.get("since")?,
            status: row.get("status")?,
            error: row.get("error")?,
            queued_at: row.get("queued_at")?,
            started_at: row.get("started_at")?,
            finished_at: row.get("finished_at")?,
        })
    }
}

/// Succeeded/failed counts for a subject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
}

pub fn insert(db: &Database, run: &RunRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO runs (id, job_id, scraper, mode, since, status, error, queued_at,
             started_at, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                run.id,
                run.job_id,
                run.scraper,
                run.mode,
                run.since,
                run.status,
                run.error,
                run.queued_at,
                run.started_at,
                run.finished_at,
            ],
        )?;
        Ok(())
    })
}

/// Overwrites the mutable fields of a run (status, error, timestamps).
pub fn update(db: &Database, run: &RunRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE runs SET status = ?2, error = ?3, started_at = ?4, finished_at = ?5
             WHERE id = ?1",
            params![
                run.id,
                run.status,
                run.error,
                run.started_at,
                run.finished_at,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<RunRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row("SELECT * FROM runs WHERE id = ?1", params![id], RunRow::from_row)
            .optional()?;
        Ok(row)
    })
}

/// Most recently queued run for a subject.
pub fn latest(db: &Database, subject: Subject<'_>) -> Result<Option<RunRow>, DatabaseError> {
    db.with_conn(|conn| {
        let sql = format!(
            "SELECT * FROM runs WHERE {} = ?1 ORDER BY queued_at DESC, rowid DESC LIMIT 1",
            subject.column()
        );
        let row = conn
            .query_row(&sql, params![subject.value()], RunRow::from_row)
            .optional()?;
        Ok(row)
    })
}

/// Counts runs queued at or after `since`, split by outcome.
pub fn outcome_counts(
    db: &Database,
    subject: Subject<'_>,
    since: &str,
) -> Result<OutcomeCounts, DatabaseError> {
    db.with_conn(|conn| {
        let sql = format!(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN status = 'succeeded' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0)
             FROM runs WHERE {} = ?1 AND queued_at >= ?2",
            subject.column()
        );
        let counts = conn.query_row(&sql, params![subject.value(), since], |r| {
            Ok(OutcomeCounts {
                total: r.get(0)?,
                succeeded: r.get(1)?,
                failed: r.get(2)?,
            })
        })?;
        Ok(counts)
    })
}

/// Error of the most recent failed run for a subject.
pub fn last_error(db: &Database, subject: Subject<'_>) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        let sql = format!(
            "SELECT error FROM runs WHERE {} = ?1 AND status = 'failed'
             ORDER BY finished_at DESC, rowid DESC LIMIT 1",
            subject.column()
        );
        let error: Option<Option<String>> = conn
            .query_row(&sql, params![subject.value()], |r| r.get(0))
            .optional()?;
        Ok(error.flatten())
    })
}

/// Failed runs that finished at or after `since`, newest first.
pub fn failures_since(db: &Database, since: &str) -> Result<Vec<RunRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM runs WHERE status = 'failed' AND finished_at >= ?1
             ORDER BY finished_at DESC, rowid DESC",
        )?;
        let rows = stmt
            .query_map(params![since], RunRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(id: &str, job_id: &str, status: &str, queued_at: &str) -> RunRow {
        RunRow {
            id: id.to_string(),
            job_id: job_id.to_string(),
            scraper: "openparliament".to_string(),
            mode: "daily".to_string(),
            since: None,
            status: status.to_string(),
            error: None,
            queued_at: queued_at.to_string(),
            started_at: None,
            finished_at: None,
        }
    }

    #[test]
    fn test_insert_find_update() {
        let db = Database::open_in_memory().unwrap();
        let mut row = run("r1", "federal:bills:daily", "queued", "2026-01-01T00:00:00.000000Z");
        insert(&db, &row).unwrap();
        assert_eq!(find_by_id(&db, "r1").unwrap(), Some(row.clone()));

        row.status = "failed".to_string();
        row.error = Some("HTTP 500".to_string());
        row.finished_at = Some("2026-01-01T00:05:00.000000Z".to_string());
        update(&db, &row).unwrap();
        assert_eq!(find_by_id(&db, "r1").unwrap(), Some(row));
        assert!(find_by_id(&db, "missing").unwrap().is_none());
    }

    #[test]
    fn test_latest_by_job_and_scraper() {
        let db = Database::open_in_memory().unwrap();
        insert(&db, &run("r1", "federal:bills:daily", "succeeded", "2026-01-01T00:00:00.000000Z")).unwrap();
        insert(&db, &run("r2", "federal:votes:daily", "queued", "2026-01-02T00:00:00.000000Z")).unwrap();

        let latest_job = latest(&db, Subject::Job("federal:bills:daily")).unwrap().unwrap();
        assert_eq!(latest_job.id, "r1");
        let latest_scraper = latest(&db, Subject::Scraper("openparliament")).unwrap().unwrap();
        assert_eq!(latest_scraper.id, "r2");
        assert!(latest(&db, Subject::Job("nope")).unwrap().is_none());
    }

    #[test]
    fn test_outcome_counts_respects_window() {
        let db = Database::open_in_memory().unwrap();
        insert(&db, &run("old", "j", "failed", "2025-01-01T00:00:00.000000Z")).unwrap();
        insert(&db, &run("a", "j", "succeeded", "2026-01-01T00:00:00.000000Z")).unwrap();
        insert(&db, &run("b", "j", "failed", "2026-01-02T00:00:00.000000Z")).unwrap();
        insert(&db, &run("c", "j", "queued", "2026-01-03T00:00:00.000000Z")).unwrap();

        let counts = outcome_counts(&db, Subject::Job("j"), "2025-12-01T00:00:00.000000Z").unwrap();
        assert_eq!(
            counts,
            OutcomeCounts {
                total: 3,
                succeeded: 1,
                failed: 1
            }
        );
    }

    #[test]
    fn test_failures_since_and_last_error() {
        let db = Database::open_in_memory().unwrap();
        let mut a = run("a", "j", "failed", "2026-01-01T00:00:00.000000Z");
        a.error = Some("timeout".to_string());
        a.finished_at = Some("2026-01-01T00:01:00.000000Z".to_string());
        let mut b = run("b", "j", "failed", "2026-01-02T00:00:00.000000Z");
        b.error = Some("parse error".to_string());
        b.finished_at = Some("2026-01-02T00:01:00.000000Z".to_string());
        insert(&db, &a).unwrap();
        insert(&db, &b).unwrap();

        let failures = failures_since(&db, "2026-01-01T00:00:00.000000Z").unwrap();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].id, "b");

        let failures = failures_since(&db, "2026-01-02T00:00:00.000000Z").unwrap();
        assert_eq!(failures.len(), 1);

        assert_eq!(
            last_error(&db, Subject::Job("j")).unwrap().as_deref(),
            Some("parse error")
        );
        assert!(last_error(&db, Subject::Job("other")).unwrap().is_none());
    }
}
