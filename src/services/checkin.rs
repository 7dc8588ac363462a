// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Check-in capture and location mirror refresh.

use std::sync::Arc;

use async_trait::async_trait;

use super::geo;
use super::sync::{
    register_background_sync, DrainReport, SyncDrainer, SyncRegistrar, UploadOptions,
    UploadOutcome,
};
use crate::client::{ApiClient, ApiError};
use crate::config::ClientConfig;
use crate::db::{LocalStore, StoreError};
use crate::models::{LocationSnapshot, NewCheckin};

/// Source of the server location list.
#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn fetch_locations(&self) -> Result<Vec<LocationSnapshot>, ApiError>;
}

#[async_trait]
impl LocationSource for ApiClient {
    async fn fetch_locations(&self) -> Result<Vec<LocationSnapshot>, ApiError> {
        self.locations().await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CheckinError {
    #[error("Too far from location: {distance_m:.0} m away, allowed {radius_m:.0} m")]
    OutOfRange { distance_m: f64, radius_m: f64 },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// What happened to a submitted check-in.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Accepted by the server right away.
    Uploaded { record_id: i64 },
    /// Kept in the local queue for a later drain.
    Queued {
        record_id: i64,
        status: u16,
        message: String,
        sync_registered: bool,
    },
}

/// Check-in flow used by the UI: validate, queue, try to upload.
pub struct CheckinService {
    store: LocalStore,
    drainer: SyncDrainer,
    registrar: Arc<dyn SyncRegistrar>,
    locations: Arc<dyn LocationSource>,
    config: ClientConfig,
}

impl CheckinService {
    pub fn new(
        store: LocalStore,
        drainer: SyncDrainer,
        registrar: Arc<dyn SyncRegistrar>,
        locations: Arc<dyn LocationSource>,
        config: ClientConfig,
    ) -> Self {
        Self {
            store,
            drainer,
            registrar,
            locations,
            config,
        }
    }

    /// Submit a check-in.
    ///
    /// The record is written to the local queue before any upload attempt,
    /// so a failed or interrupted upload never loses it. A successful upload
    /// shows the server is reachable, so any older backlog is flushed too.
    pub async fn submit(&self, checkin: NewCheckin) -> Result<SubmitOutcome, CheckinError> {
        self.check_proximity(&checkin)?;

        let record = self.store.add_checkin(&checkin)?;

        match self
            .drainer
            .uploader()
            .upload_one(&record, UploadOptions::default())
            .await
        {
            UploadOutcome::Uploaded { .. } => {
                self.store.mark_synced(record.id)?;
                tracing::info!(record_id = record.id, "Check-in uploaded");
                if !self.store.unsynced_checkins()?.is_empty() {
                    self.sync_pending().await;
                }
                Ok(SubmitOutcome::Uploaded {
                    record_id: record.id,
                })
            }
            UploadOutcome::Failed { status, message } => {
                tracing::info!(record_id = record.id, status, error = %message, "Check-in queued for background sync");
                let sync_registered = register_background_sync(
                    self.registrar.as_ref(),
                    &self.config.sync_tag,
                    self.config.sync_registration_attempts,
                    self.config.sync_registration_backoff,
                )
                .await;
                Ok(SubmitOutcome::Queued {
                    record_id: record.id,
                    status,
                    message,
                    sync_registered,
                })
            }
        }
    }

    /// Drain the local queue now, without waiting for a background sync.
    pub async fn sync_pending(&self) -> DrainReport {
        self.drainer.drain().await
    }

    /// Reject a check-in outside the mirrored location's radius.
    ///
    /// Without coordinates or without a local snapshot of the location
    /// there is nothing to check against, and the server decides.
    fn check_proximity(&self, checkin: &NewCheckin) -> Result<(), CheckinError> {
        let Some((latitude, longitude)) = checkin.latitude.zip(checkin.longitude) else {
            return Ok(());
        };
        let Some(location) = self.store.location(checkin.location_reference)? else {
            tracing::debug!(
                location = checkin.location_reference,
                "Location not in local snapshot, skipping proximity check"
            );
            return Ok(());
        };

        if geo::within_radius(&location, latitude, longitude) {
            return Ok(());
        }

        Err(CheckinError::OutOfRange {
            distance_m: geo::distance_meters(
                location.latitude,
                location.longitude,
                latitude,
                longitude,
            ),
            radius_m: location.allowed_radius,
        })
    }

    /// Replace the local location mirror with the server list.
    ///
    /// On any failure the previous snapshot is kept as is.
    pub async fn refresh_locations(&self) -> Result<usize, CheckinError> {
        let locations = self.locations.fetch_locations().await?;
        Ok(self.store.replace_locations(&locations)?)
    }
}
