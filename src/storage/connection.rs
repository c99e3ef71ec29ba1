//! Catalog database handle.
//!
//! The catalog is a single `SQLite` connection in WAL mode. Every access
//! goes through one mutex, so callers never see a half-applied write.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, TransactionBehavior};

use crate::error::StorageError;
use crate::Result;

const PRAGMAS: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
    PRAGMA temp_store = MEMORY;
    PRAGMA foreign_keys = ON;
";

/// Shared handle to the catalog connection. Clones share it.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    /// File path, or `:memory:`; only used for diagnostics.
    label: Arc<str>,
}

impl Database {
    /// Open the catalog file at `path`, creating missing parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or configured.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags).map_err(|e| {
            StorageError::Database(format!("cannot open catalog '{}': {e}", path.display()))
        })?;
        Self::configured(conn, &path.display().to_string())
    }

    /// Open a throwaway in-memory catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if `SQLite` cannot allocate the database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::Database(format!("cannot open in-memory catalog: {e}")))?;
        Self::configured(conn, ":memory:")
    }

    fn configured(conn: Connection, label: &str) -> Result<Self> {
        conn.execute_batch(PRAGMAS)
            .map_err(|e| StorageError::Database(format!("cannot configure catalog: {e}")))?;
        tracing::debug!(catalog = label, "Catalog opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            label: label.into(),
        })
    }

    /// Run `f` with the connection locked.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        f(&self.conn.lock())
    }

    /// Run `f` inside an immediate transaction, committing only on success.
    ///
    /// # Errors
    ///
    /// Returns the error of `f` (after rolling back), or a storage error if
    /// the transaction cannot begin or commit.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StorageError::Database(format!("cannot begin transaction: {e}")))?;

        // Dropping `tx` without commit rolls back
        let value = f(&tx)?;
        tx.commit()
            .map_err(|e| StorageError::Database(format!("cannot commit transaction: {e}")))?;
        Ok(value)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("catalog", &self.label)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scalar(db: &Database, sql: &str) -> i64 {
        db.with_conn(|conn| {
            conn.query_row(sql, [], |row| row.get(0))
                .map_err(|e| StorageError::from(e).into())
        })
        .unwrap()
    }

    fn table(db: &Database) {
        db.with_conn(|conn| {
            conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY)")
                .map_err(|e| StorageError::from(e).into())
        })
        .unwrap();
    }

    #[test]
    fn test_open_file_in_wal_mode() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data").join("tunedex.db");

        let db = Database::open(&path).unwrap();
        assert!(path.exists());

        let mode: String = db
            .with_conn(|conn| {
                conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))
                    .map_err(|e| StorageError::from(e).into())
            })
            .unwrap();
        assert_eq!(mode, "wal");
        assert_eq!(scalar(&db, "PRAGMA foreign_keys"), 1);
    }

    #[test]
    fn test_transaction_commits_on_success() {
        let db = Database::open_in_memory().unwrap();
        table(&db);

        let id = db
            .with_transaction(|conn| {
                conn.execute("INSERT INTO t (id) VALUES (7)", [])
                    .map_err(StorageError::from)?;
                Ok(conn.last_insert_rowid())
            })
            .unwrap();
        assert_eq!(id, 7);
        assert_eq!(scalar(&db, "SELECT COUNT(*) FROM t"), 1);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = Database::open_in_memory().unwrap();
        table(&db);

        let result: Result<()> = db.with_transaction(|conn| {
            conn.execute("INSERT INTO t (id) VALUES (1)", [])
                .map_err(StorageError::from)?;
            Err(crate::Error::internal("album insert failed"))
        });
        assert!(result.is_err());
        assert_eq!(scalar(&db, "SELECT COUNT(*) FROM t"), 0);

        // The connection is usable again after the rollback
        db.with_transaction(|conn| {
            conn.execute("INSERT INTO t (id) VALUES (2)", [])
                .map_err(StorageError::from)?;
            Ok(())
        })
        .unwrap();
        assert_eq!(scalar(&db, "SELECT COUNT(*) FROM t"), 1);
    }

    #[test]
    fn test_clones_share_connection() {
        let db = Database::open_in_memory().unwrap();
        table(&db);

        let other = db.clone();
        other
            .with_conn(|conn| {
                conn.execute("INSERT INTO t (id) VALUES (3)", [])
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .unwrap();
        assert_eq!(scalar(&db, "SELECT id FROM t"), 3);
    }
}
