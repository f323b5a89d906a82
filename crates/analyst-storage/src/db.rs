//! SQLite handle for the order store.
//!
//! One connection serves the whole process; callers borrow it through
//! `Database::with_conn`.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use analyst_core::error::AnalystError;

use crate::migrations;

/// Pragmas for on-disk stores; the page cache is capped at 16 MiB.
const FILE_PRAGMAS: &str = "PRAGMA journal_mode = WAL;
     PRAGMA synchronous = NORMAL;
     PRAGMA cache_size = -16384;";

fn storage_err(context: &'static str) -> impl Fn(rusqlite::Error) -> AnalystError {
    move |e| AnalystError::Storage(format!("{}: {}", context, e))
}

/// The order store's single SQLite connection.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the store at `path`, creating missing parent directories and
    /// bringing the schema up to date.
    pub fn new(path: &Path) -> Result<Self, AnalystError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(storage_err("Failed to open database"))?;
        conn.execute_batch(FILE_PRAGMAS)
            .map_err(storage_err("Failed to set pragmas"))?;
        info!(path = %path.display(), "Order store opened");

        Self::migrated(conn)
    }

    /// A throwaway store that lives as long as the returned value.
    pub fn in_memory() -> Result<Self, AnalystError> {
        let conn = Connection::open_in_memory()
            .map_err(storage_err("Failed to open in-memory database"))?;
        Self::migrated(conn)
    }

    fn migrated(conn: Connection) -> Result<Self, AnalystError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Run `f` against the connection. Other callers wait until it returns.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, AnalystError>
    where
        F: FnOnce(&Connection) -> Result<T, AnalystError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| AnalystError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_database() {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))
                .map_err(|e| AnalystError::Storage(e.to_string()))?;
            assert_eq!(count, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("orders.db");
        let db = Database::new(&path).unwrap();

        db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))
                .map_err(|e| AnalystError::Storage(e.to_string()))?;
            assert_eq!(count, 0);
            Ok(())
        })
        .unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_file_database_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&dir.path().join("orders.db")).unwrap();
        let (mode, synchronous): (String, i64) = db
            .with_conn(|conn| {
                let mode = conn.query_row("PRAGMA journal_mode", [], |row| row.get::<_, String>(0));
                let sync = conn.query_row("PRAGMA synchronous", [], |row| row.get::<_, i64>(0));
                mode.and_then(|m| sync.map(|s| (m, s)))
                    .map_err(|e| AnalystError::Storage(e.to_string()))
            })
            .unwrap();
        assert_eq!(mode, "wal");
        assert_eq!(synchronous, 1);
    }

    #[test]
    fn test_reopen_keeps_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.db");
        drop(Database::new(&path).unwrap());

        let db = Database::new(&path).unwrap();
        let version: i64 = db
            .with_conn(|conn| {
                conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                    row.get(0)
                })
                .map_err(|e| AnalystError::Storage(e.to_string()))
            })
            .unwrap();
        assert_eq!(version, 1);
    }
}
