//! Failures of the run-history store.

use std::path::PathBuf;
use thiserror::Error;

/// Raised while opening, migrating or querying the run-history database.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The data directory under `~/.scrapectl` could not be created.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A schema step failed; the version names the SQL file under `sql/`.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// A run, log or job-state row holds a value we cannot read back,
    /// such as a malformed timestamp or an unknown run status.
    #[error("Corrupt row in '{table}': {reason}")]
    CorruptRow { table: &'static str, reason: String },

    /// A request handler panicked while holding the connection.
    #[error("Database lock poisoned")]
    LockPoisoned,
}
