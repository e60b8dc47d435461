//! SQLite local store

use crate::{decode, encode, LocalStore, StorageError, STORAGE_KEY};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use shelf_core::Snapshot;
use std::path::Path;
use tracing::debug;

/// SQLite local store
///
/// Embedded persistence that survives process restarts. The replica is one
/// row keyed by [`STORAGE_KEY`]; its version and write time are mirrored in
/// columns for inspection with the sqlite shell.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at the given path
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Io(e.to_string()))?;
        }

        let conn = Connection::open(path).map_err(|e| StorageError::Database(e.to_string()))?;
        debug!(path = %path.display(), "Opened replica database");

        let store = Self {
            conn: Mutex::new(conn),
        };

        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory SQLite database (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StorageError::Database(e.to_string()))?;

        let store = Self {
            conn: Mutex::new(conn),
        };

        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS replica (
                key TEXT PRIMARY KEY,
                data BLOB NOT NULL,
                version INTEGER NOT NULL DEFAULT 0,
                last_write_ts INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
            );
            "#,
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    fn read_record(&self) -> Result<Option<Vec<u8>>, StorageError> {
        let conn = self.conn.lock();

        conn.query_row(
            "SELECT data FROM replica WHERE key = ?1",
            params![STORAGE_KEY],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| StorageError::Database(e.to_string()))
    }
}

#[async_trait]
impl LocalStore for SqliteStore {
    async fn load(&self) -> Result<Snapshot, StorageError> {
        match self.read_record()? {
            Some(bytes) => decode(STORAGE_KEY, &bytes),
            None => Ok(Snapshot::new()),
        }
    }

    async fn replace(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let bytes = encode(snapshot)?;
        // SQLite integers are signed
        let version = i64::try_from(snapshot.version).unwrap_or(i64::MAX);
        let last_write_ts = i64::try_from(snapshot.last_write_ts).unwrap_or(i64::MAX);

        let conn = self.conn.lock();

        conn.execute(
            r#"
            INSERT INTO replica (key, data, version, last_write_ts, updated_at)
            VALUES (?1, ?2, ?3, ?4, strftime('%s', 'now') * 1000)
            ON CONFLICT(key) DO UPDATE SET
                data = excluded.data,
                version = excluded.version,
                last_write_ts = excluded.last_write_ts,
                updated_at = excluded.updated_at
            "#,
            params![STORAGE_KEY, bytes, version, last_write_ts],
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    async fn raw(&self) -> Result<Option<Vec<u8>>, StorageError> {
        self.read_record()
    }
}
