//! Schema initialization and connection pragmas.
//!
//! The queue owns exactly one table:
//!
//! ```sql
//! CREATE TABLE payloads (
//!     id      INTEGER PRIMARY KEY AUTOINCREMENT,
//!     payload BLOB NOT NULL
//! );
//! ```
//!
//! `AUTOINCREMENT` keeps ids strictly increasing even after the newest rows
//! are deleted, so an acknowledged id is never handed out again.

use rusqlite::Connection;
use std::time::Duration;

/// Version stamped into `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS payloads (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        payload BLOB NOT NULL
    );
"#;

/// Apply pragmas for the single writer connection.
///
/// WAL lets batch reads proceed while inserts and deletes are in flight;
/// `synchronous=FULL` makes each accepted payload durable before returning.
pub fn apply_pragmas(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "FULL")?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}

/// Apply pragmas for pooled read-only connections.
pub fn apply_reader_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "query_only", true)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(())
}

/// Create the payload table if absent and stamp the schema version.
///
/// Safe to call on every startup. A database written by a newer version is
/// left untouched; upgrades are a no-op in this version.
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if version == 0 {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    } else if version > SCHEMA_VERSION {
        tracing::warn!(
            found = version,
            supported = SCHEMA_VERSION,
            "Queue database was written by a newer schema version"
        );
    }

    Ok(())
}

/// Count every row in the payload table.
pub fn count_rows(conn: &Connection) -> rusqlite::Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM payloads", [], |row| row.get(0))?;
    Ok(count.max(0) as u64)
}

/// Insert a payload blob, returning its assigned id.
pub fn insert_payload(conn: &Connection, payload: &[u8]) -> rusqlite::Result<i64> {
    let mut stmt = conn.prepare_cached("INSERT INTO payloads (payload) VALUES (?1)")?;
    stmt.insert([payload])
}

/// Delete rows with `min_id <= id <= max_id`, returning how many went away.
pub fn delete_range(conn: &Connection, min_id: i64, max_id: i64) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare_cached("DELETE FROM payloads WHERE id >= ?1 AND id <= ?2")?;
    stmt.execute([min_id, max_id])
}
