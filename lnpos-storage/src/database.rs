//! SQLite-backed key/value store

use crate::{migrations, store::KeyValueStore, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;

/// Key/value store persisted in a single SQLite file
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at `path` and bring the schema up to date
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        // journal_mode returns a row
        let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        tracing::debug!("SQLite journal mode: {}", mode);

        Self::init(conn)
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Current schema version
    pub fn schema_version(&self) -> Result<i32> {
        migrations::get_schema_version(&self.conn.lock())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .lock()
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.lock().execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .lock()
            .execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.conn.lock().execute("DELETE FROM kv", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_open_in_memory() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("pos.currency", "EUR").unwrap();
        assert_eq!(store.get("pos.currency").unwrap().as_deref(), Some("EUR"));
    }

    #[test]
    fn test_values_survive_reopen() {
        let file = NamedTempFile::new().unwrap();

        {
            let store = SqliteStore::open(file.path()).unwrap();
            store.set("pos.pin", "1234").unwrap();
            store.set("pos.pin", "5678").unwrap();
            store.set("pos.currency", "USD").unwrap();
            store.remove("pos.currency").unwrap();
        }

        let store = SqliteStore::open(file.path()).unwrap();
        assert_eq!(store.get("pos.pin").unwrap().as_deref(), Some("5678"));
        assert_eq!(store.get("pos.currency").unwrap(), None);
    }
}
