// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Durable local store for pending check-ins and the location mirror.
//!
//! Provides typed operations for:
//! - Check-ins (auto-identified, queued until the server accepts them)
//! - Locations (full snapshot of the server list, replaced on refresh)
//! - The persisted access credential
//!
//! Cache generations used by the service worker live in the same database,
//! see [`super::cache_entries`].

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection, OptionalExtension};

use super::{migrations, tables, Result, StoreError};
use crate::models::{AccessCredential, LocationSnapshot, NewCheckin, PendingCheckin};

const ACCESS_SLOT: &str = "access";

/// Handle to the on-device SQLite database.
///
/// Cloning is cheap; all clones share one connection. Statements run
/// while holding the connection lock and never across an `.await`.
#[derive(Clone)]
pub struct LocalStore {
    conn: Arc<Mutex<Connection>>,
}

impl LocalStore {
    /// Open (or create) the store at a path and bring the schema up to date.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::info!(path = %path.display(), journal_mode = %mode, "Opened local store");

        Self::from_connection(conn)
    }

    /// Open a throwaway in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Lock the connection. A panic in another holder does not corrupt
    /// SQLite state, so a poisoned lock is recovered.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ─── Check-in Operations ─────────────────────────────────────

    /// Queue a new check-in. The store assigns a monotonic id and the
    /// record starts unsynced.
    pub fn add_checkin(&self, checkin: &NewCheckin) -> Result<PendingCheckin> {
        if crate::time_utils::parse_rfc3339_utc(&checkin.checkin_timestamp).is_none() {
            return Err(StoreError::InvalidTimestamp(
                checkin.checkin_timestamp.clone(),
            ));
        }

        let conn = self.conn();
        conn.execute(
            "INSERT INTO checkins
                (user_reference, location_reference, latitude, longitude, checkin_timestamp, synced)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
            params![
                checkin.user_reference,
                checkin.location_reference,
                checkin.latitude,
                checkin.longitude,
                checkin.checkin_timestamp,
            ],
        )?;
        let id = conn.last_insert_rowid();

        tracing::debug!(record_id = id, "Queued check-in");

        Ok(PendingCheckin {
            id,
            user_reference: checkin.user_reference,
            location_reference: checkin.location_reference,
            latitude: checkin.latitude,
            longitude: checkin.longitude,
            checkin_timestamp: checkin.checkin_timestamp.clone(),
            synced: false,
        })
    }

    /// Insert or overwrite a record by id.
    pub fn put_checkin(&self, record: &PendingCheckin) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO checkins
                (id, user_reference, location_reference, latitude, longitude, checkin_timestamp, synced)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id,
                record.user_reference,
                record.location_reference,
                record.latitude,
                record.longitude,
                record.checkin_timestamp,
                record.synced,
            ],
        )?;
        Ok(())
    }

    pub fn get_checkin(&self, id: i64) -> Result<Option<PendingCheckin>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT id, user_reference, location_reference, latitude, longitude,
                        checkin_timestamp, synced
                 FROM checkins WHERE id = ?1",
                params![id],
                row_to_checkin,
            )
            .optional()?)
    }

    /// Every record, in natural enumeration (id) order.
    pub fn all_checkins(&self) -> Result<Vec<PendingCheckin>> {
        self.query_checkins(
            "SELECT id, user_reference, location_reference, latitude, longitude,
                    checkin_timestamp, synced
             FROM checkins ORDER BY id ASC",
        )
    }

    /// Records the server has not confirmed yet, in id order.
    pub fn unsynced_checkins(&self) -> Result<Vec<PendingCheckin>> {
        self.query_checkins(
            "SELECT id, user_reference, location_reference, latitude, longitude,
                    checkin_timestamp, synced
             FROM checkins WHERE synced = 0 ORDER BY id ASC",
        )
    }

    /// Flag a record as accepted by the server. Returns false if no such
    /// record exists.
    pub fn mark_synced(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn()
            .execute("UPDATE checkins SET synced = 1 WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    fn query_checkins(&self, sql: &str) -> Result<Vec<PendingCheckin>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], row_to_checkin)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    // ─── Location Operations ─────────────────────────────────────

    /// Replace the whole location mirror in one transaction.
    ///
    /// Either every row of `locations` is written or the previous snapshot
    /// is left untouched.
    pub fn replace_locations(&self, locations: &[LocationSnapshot]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(&format!("DELETE FROM {}", tables::LOCATIONS), [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO locations (id, name, latitude, longitude, allowed_radius)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for location in locations {
                stmt.execute(params![
                    location.id,
                    location.name,
                    location.latitude,
                    location.longitude,
                    location.allowed_radius,
                ])?;
            }
        }
        tx.commit()?;

        tracing::info!(count = locations.len(), "Replaced location snapshot");
        Ok(locations.len())
    }

    pub fn location(&self, id: i64) -> Result<Option<LocationSnapshot>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT id, name, latitude, longitude, allowed_radius
                 FROM locations WHERE id = ?1",
                params![id],
                row_to_location,
            )
            .optional()?)
    }

    pub fn all_locations(&self) -> Result<Vec<LocationSnapshot>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, latitude, longitude, allowed_radius
             FROM locations ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], row_to_location)?;

        let mut locations = Vec::new();
        for row in rows {
            locations.push(row?);
        }
        Ok(locations)
    }

    // ─── Credential Operations ───────────────────────────────────

    pub fn load_credential(&self) -> Result<Option<AccessCredential>> {
        let value: Option<String> = self
            .conn()
            .query_row(
                "SELECT value FROM credentials WHERE slot = ?1",
                params![ACCESS_SLOT],
                |row| row.get(0),
            )
            .optional()?;

        value
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(StoreError::from)
    }

    pub fn save_credential(&self, credential: &AccessCredential) -> Result<()> {
        let json = serde_json::to_string(credential)?;
        self.conn().execute(
            "INSERT OR REPLACE INTO credentials (slot, value) VALUES (?1, ?2)",
            params![ACCESS_SLOT, json],
        )?;
        Ok(())
    }

    pub fn clear_credential(&self) -> Result<()> {
        self.conn().execute(
            "DELETE FROM credentials WHERE slot = ?1",
            params![ACCESS_SLOT],
        )?;
        Ok(())
    }
}

fn row_to_checkin(row: &rusqlite::Row<'_>) -> rusqlite::Result<PendingCheckin> {
    Ok(PendingCheckin {
        id: row.get(0)?,
        user_reference: row.get(1)?,
        location_reference: row.get(2)?,
        latitude: row.get(3)?,
        longitude: row.get(4)?,
        checkin_timestamp: row.get(5)?,
        synced: row.get(6)?,
    })
}

fn row_to_location(row: &rusqlite::Row<'_>) -> rusqlite::Result<LocationSnapshot> {
    Ok(LocationSnapshot {
        id: row.get(0)?,
        name: row.get(1)?,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        allowed_radius: row.get(4)?,
    })
}
