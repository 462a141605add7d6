//! Log lines reported by the external scrapers.

use rusqlite::{params, Row};

use super::{Database, DatabaseError, Subject};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRow {
    pub id: i64,
    pub job_id: String,
    pub scraper: String,
    pub run_id: Option<String>,
    pub level: String,
    pub message: String,
    pub logged_at: String,
}

impl LogRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            scraper: row.get("scraper")?,
            run_id: row.get("run_id")?,
            level: row.get("level")?,
            message: row.get("message")?,
            logged_at: row.get("logged_at")?,
        })
    }
}

/// Appends log lines in one transaction. `id` on the input rows is ignored.
pub fn insert_many(db: &Database, rows: &[LogRow]) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO run_logs (job_id, scraper, run_id, level, message, logged_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.job_id,
                    row.scraper,
                    row.run_id,
                    row.level,
                    row.message,
                    row.logged_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    })
}

/// Returns at most `limit` lines for the subject, newest first.
pub fn recent(db: &Database, subject: Subject<'_>, limit: u32) -> Result<Vec<LogRow>, DatabaseError> {
    db.with_conn(|conn| {
        let sql = format!(
            "SELECT * FROM run_logs WHERE {} = ?1 ORDER BY id DESC LIMIT ?2",
            subject.column()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![subject.value(), limit], LogRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(job_id: &str, scraper: &str, message: &str) -> LogRow {
        LogRow {
            id: 0,
            job_id: job_id.to_string(),
            scraper: scraper.to_string(),
            run_id: None,
            level: "info".to_string(),
            message: message.to_string(),
            logged_at: "2026-01-01T00:00:00.000000Z".to_string(),
        }
    }

    #[test]
    fn test_recent_is_newest_first_and_limited() {
        let db = Database::open_in_memory().unwrap();
        let rows: Vec<LogRow> = (1..=5)
            .map(|i| line("federal:bills:daily", "openparliament", &format!("line {}", i)))
            .collect();
        assert_eq!(insert_many(&db, &rows).unwrap(), 5);

        let recent_rows = recent(&db, Subject::Job("federal:bills:daily"), 3).unwrap();
        let messages: Vec<&str> = recent_rows.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["line 5", "line 4", "line 3"]);
    }

    #[test]
    fn test_recent_by_scraper() {
        let db = Database::open_in_memory().unwrap();
        insert_many(
            &db,
            &[
                line("federal:bills:daily", "openparliament", "a"),
                line("on:bills:daily", "scrapers-ca", "b"),
                line("federal:votes:daily", "openparliament", "c"),
            ],
        )
        .unwrap();

        let rows = recent(&db, Subject::Scraper("openparliament"), 10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].message, "c");
        assert!(recent(&db, Subject::Job("nope"), 10).unwrap().is_empty());
    }
}
