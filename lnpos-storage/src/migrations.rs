//! Database schema migrations

use crate::{Error, Result};
use rusqlite::Connection;

const SCHEMA_VERSION: i32 = 2;

/// Run all migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    tracing::debug!(
        "Running migrations: current_version={}, target_version={}",
        current_version,
        SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Current schema version (0 for a fresh database)
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    let result = conn.query_row(
        "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
        [],
        |row| row.get(0),
    );

    match result {
        Ok(v) => Ok(v),
        Err(_) => Ok(0),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
        [],
    )?;

    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
            [version],
        )
        .map_err(|e| Error::Migration(format!("failed to record version {}: {}", version, e)))?;

    if inserted > 0 {
        tracing::debug!("Inserted schema version {}", version);
    }
    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        "#,
    )?;

    set_schema_version(conn, 1)
}

/// Track last modification time per key
fn migrate_v2(conn: &Connection) -> Result<()> {
    let columns: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info('kv') WHERE name = 'updated_at'",
        [],
        |row| row.get(0),
    )?;

    if columns == 0 {
        conn.execute_batch(
            "ALTER TABLE kv ADD COLUMN updated_at INTEGER NOT NULL DEFAULT 0;",
        )?;
    }

    set_schema_version(conn, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_database_reaches_latest_version() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 0);

        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_v1_database_upgrades() {
        let conn = Connection::open_in_memory().unwrap();
        migrate_v1(&conn).unwrap();
        conn.execute("INSERT INTO kv (key, value) VALUES ('a', 'b')", [])
            .unwrap();

        run_migrations(&conn).unwrap();

        let (value, updated_at): (String, i64) = conn
            .query_row("SELECT value, updated_at FROM kv WHERE key = 'a'", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(value, "b");
        assert_eq!(updated_at, 0);
    }
}
