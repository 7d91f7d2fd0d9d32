//! SQLite backend for the continuity slot

use super::traits::{ContinuityStore, OpenStore, StoreError, StoreResult, RESULT_SLOT};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed slot store
///
/// One row per slot name in a `slots` table. Only [`RESULT_SLOT`] is used.
/// Thread-safe via internal mutex on the connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    fn init_schema(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS slots (
                name TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                saved_at TEXT NOT NULL
            );

            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// When the slot was last written, if ever.
    pub fn saved_at(&self) -> StoreResult<Option<chrono::DateTime<chrono::Utc>>> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT saved_at FROM slots WHERE name = ?1",
                params![RESULT_SLOT],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc)))
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::from_connection(Connection::open(path)?)
    }

    fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }
}

impl ContinuityStore for SqliteStore {
    fn load(&self) -> StoreResult<Option<String>> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let body = conn
            .query_row(
                "SELECT body FROM slots WHERE name = ?1",
                params![RESULT_SLOT],
                |row| row.get(0),
            )
            .optional()?;
        Ok(body)
    }

    fn save(&self, record: &str) -> StoreResult<()> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "INSERT INTO slots (name, body, saved_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET body = excluded.body, saved_at = excluded.saved_at",
            params![RESULT_SLOT, record, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_store_loads_nothing() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.load().unwrap(), None);
        assert!(store.saved_at().unwrap().is_none());
    }

    #[test]
    fn save_replaces_previous_record() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.save("first").unwrap();
        store.save("second").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("second"));
        assert!(store.saved_at().unwrap().is_some());
    }

    #[test]
    fn record_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("continuity.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.save(r#"{"result_type":"text","data":"kept"}"#).unwrap();
        }
        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(
            reopened.load().unwrap().as_deref(),
            Some(r#"{"result_type":"text","data":"kept"}"#)
        );
    }
}
