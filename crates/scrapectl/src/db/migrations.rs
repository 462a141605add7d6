//! Schema versions for the job-state, run and log tables.
//!
//! Each step is a SQL file under `sql/`; `_migrations` records the highest
//! version applied so a restart only runs the newer files.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// Ordered by version. Never edit a shipped step; add a new file instead.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_job_state_table",
        sql: include_str!("sql/001_create_job_state.sql"),
    },
    Migration {
        version: 2,
        description: "create_runs_table",
        sql: include_str!("sql/002_create_runs.sql"),
    },
    Migration {
        version: 3,
        description: "create_run_logs_table",
        sql: include_str!("sql/003_create_run_logs.sql"),
    },
];

/// Brings the schema on `conn` up to the newest version.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        log::info!(
            "Applying schema v{} ({})",
            migration.version,
            migration.description
        );

        // The step and its bookkeeping row land together or not at all.
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration.sql)
            .map_err(|e| DatabaseError::Migration {
                version: migration.version,
                reason: e.to_string(),
            })?;
        tx.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
        tx.commit()?;
    }

    Ok(())
}
