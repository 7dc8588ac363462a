// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory repository behind the REST server.

use std::path::Path;
use std::sync::RwLock;

use dashmap::DashMap;
use serde::Serialize;

use crate::models::{CheckinPayload, LocationSnapshot};

/// A check-in accepted by the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCheckin {
    pub id: i64,
    #[serde(flatten)]
    pub payload: CheckinPayload,
    pub received_at: String,
}

/// A live refresh credential.
#[derive(Debug, Clone)]
pub struct RefreshGrant {
    pub user_reference: i64,
    pub expires_at_ms: i64,
}

/// Server-side state: accepted check-ins, the location list and refresh
/// grants.
#[derive(Default)]
pub struct ServerDb {
    checkins: RwLock<Vec<StoredCheckin>>,
    locations: RwLock<Vec<LocationSnapshot>>,
    refresh_grants: DashMap<String, RefreshGrant>,
}

impl ServerDb {
    pub fn new(locations: Vec<LocationSnapshot>) -> Self {
        Self {
            locations: RwLock::new(locations),
            ..Self::default()
        }
    }

    /// Read a JSON location list (`[{id, name, lat, lng, radius}]`).
    pub fn load_locations(path: &Path) -> anyhow::Result<Vec<LocationSnapshot>> {
        let content = std::fs::read_to_string(path)?;
        let mut locations: Vec<LocationSnapshot> = serde_json::from_str(&content)?;
        locations.sort_by_key(|l| l.id);
        Ok(locations)
    }

    /// Store an accepted check-in and return its id.
    pub fn insert_checkin(&self, payload: CheckinPayload) -> i64 {
        let mut checkins = self.checkins.write().unwrap_or_else(|p| p.into_inner());
        let id = checkins.last().map(|c| c.id + 1).unwrap_or(1);
        checkins.push(StoredCheckin {
            id,
            payload,
            received_at: crate::time_utils::format_utc_rfc3339(chrono::Utc::now()),
        });
        id
    }

    pub fn checkins(&self) -> Vec<StoredCheckin> {
        self.checkins
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Locations ordered by id.
    pub fn locations(&self) -> Vec<LocationSnapshot> {
        self.locations
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn set_locations(&self, mut locations: Vec<LocationSnapshot>) {
        locations.sort_by_key(|l| l.id);
        *self.locations.write().unwrap_or_else(|p| p.into_inner()) = locations;
    }

    pub fn grant_refresh(&self, token: String, grant: RefreshGrant) {
        self.refresh_grants.insert(token, grant);
    }

    /// The grant behind `token`, if it exists and has not expired.
    /// Expired grants are dropped on lookup.
    pub fn refresh_grant(&self, token: &str, now_ms: i64) -> Option<RefreshGrant> {
        let grant = self.refresh_grants.get(token).map(|g| g.clone())?;
        if grant.expires_at_ms <= now_ms {
            self.refresh_grants.remove(token);
            return None;
        }
        Some(grant)
    }

    pub fn revoke_refresh(&self, token: &str) -> bool {
        self.refresh_grants.remove(token).is_some()
    }
}
