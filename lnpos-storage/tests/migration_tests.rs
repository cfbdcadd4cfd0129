//! Migration tests
//!
//! Tests the key/value schema on real database files.

use lnpos_storage::{migrations, KeyValueStore, SqliteStore};
use rusqlite::Connection;
use tempfile::NamedTempFile;

fn kv_columns(conn: &Connection) -> Vec<String> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('kv')").unwrap();
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    columns
}

#[test]
fn test_fresh_migration() {
    let file = NamedTempFile::new().unwrap();
    let conn = Connection::open(file.path()).unwrap();

    migrations::run_migrations(&conn).unwrap();

    assert_eq!(kv_columns(&conn), vec!["key", "value", "updated_at"]);
}

#[test]
fn test_migration_idempotency() {
    let file = NamedTempFile::new().unwrap();
    let conn = Connection::open(file.path()).unwrap();

    // Run migrations twice
    migrations::run_migrations(&conn).unwrap();
    migrations::run_migrations(&conn).unwrap();

    assert_eq!(kv_columns(&conn).len(), 3);
    let versions: i64 = conn
        .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(versions, 2);
}

#[test]
fn test_schema_version_tracking() {
    let file = NamedTempFile::new().unwrap();
    let store = SqliteStore::open(file.path()).unwrap();
    assert_eq!(store.schema_version().unwrap(), 2);
}

#[test]
fn test_upsert_records_update_time() {
    let file = NamedTempFile::new().unwrap();
    let store = SqliteStore::open(file.path()).unwrap();
    store.set("pos.currency", "USD").unwrap();
    store.set("pos.currency", "CHF").unwrap();
    drop(store);

    let conn = Connection::open(file.path()).unwrap();
    let (count, value, updated_at): (i64, String, i64) = conn
        .query_row(
            "SELECT COUNT(*), value, updated_at FROM kv WHERE key = 'pos.currency'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(value, "CHF");
    assert!(updated_at > 0);
}
