//! Schema migrations for the local store.
//!
//! Each migration is guarded by `PRAGMA user_version` so it runs exactly
//! once per database file.

use rusqlite::Connection;

use super::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 2;

const V1_CHECKINS_LOCATIONS: &str = "
CREATE TABLE IF NOT EXISTS checkins (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    user_reference     INTEGER NOT NULL,
    location_reference INTEGER NOT NULL,
    latitude           REAL,
    longitude          REAL,
    checkin_timestamp  TEXT    NOT NULL,
    synced             INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_checkins_synced ON checkins(synced);

CREATE TABLE IF NOT EXISTS locations (
    id             INTEGER PRIMARY KEY,
    name           TEXT NOT NULL,
    latitude       REAL NOT NULL,
    longitude      REAL NOT NULL,
    allowed_radius REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS credentials (
    slot  TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

const V2_CACHE_GENERATIONS: &str = "
CREATE TABLE IF NOT EXISTS caches (
    name       TEXT PRIMARY KEY,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS cache_entries (
    cache_name TEXT    NOT NULL REFERENCES caches(name) ON DELETE CASCADE,
    url        TEXT    NOT NULL,
    status     INTEGER NOT NULL,
    kind       TEXT    NOT NULL,
    headers    TEXT    NOT NULL,
    body       BLOB    NOT NULL,
    stored_at  TEXT    NOT NULL,
    PRIMARY KEY (cache_name, url)
);
";

/// Run all pending migrations against the open connection.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    tracing::debug!(
        current_version = current,
        target_version = CURRENT_VERSION,
        "Checking local store migrations"
    );

    if current < 1 {
        tracing::info!("Applying local store migration v1 (checkins, locations)");
        conn.execute_batch(V1_CHECKINS_LOCATIONS)
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        conn.pragma_update(None, "user_version", 1)?;
    }

    if current < 2 {
        tracing::info!("Applying local store migration v2 (cache generations)");
        conn.execute_batch(V2_CACHE_GENERATIONS)
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        conn.pragma_update(None, "user_version", 2)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }
}
