// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Upload of queued check-ins.
//!
//! [`upload_one`](CheckinUploader::upload_one) sends a single record and
//! never fails loudly; [`SyncDrainer::drain`] walks every unsynced record
//! once and marks the accepted ones.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;

use crate::client::api::{error_message, ApiError, CHECKIN_PATH};
use crate::client::AuthorizedClient;
use crate::db::LocalStore;
use crate::models::{CheckinAccepted, PendingCheckin};

/// Options for a single upload.
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadOptions {
    /// Send the request even when no valid token could be obtained and let
    /// the server's answer decide.
    pub attempt_without_token: bool,
}

/// Result of one upload attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Uploaded {
        status: u16,
        server_id: Option<i64>,
    },
    /// `status` is 0 when the server was never reached.
    Failed { status: u16, message: String },
}

impl UploadOutcome {
    pub fn is_uploaded(&self) -> bool {
        matches!(self, UploadOutcome::Uploaded { .. })
    }

    pub fn status(&self) -> u16 {
        match self {
            UploadOutcome::Uploaded { status, .. } | UploadOutcome::Failed { status, .. } => {
                *status
            }
        }
    }

    /// Turn a failure into an error for callers that want `?`.
    pub fn into_result(self) -> Result<Option<i64>, ApiError> {
        match self {
            UploadOutcome::Uploaded { server_id, .. } => Ok(server_id),
            UploadOutcome::Failed { status: 401, .. } => Err(ApiError::Unauthorized),
            UploadOutcome::Failed { status: 0, message } => Err(ApiError::Network(message)),
            UploadOutcome::Failed { status, message } => Err(ApiError::Status { status, message }),
        }
    }
}

/// Something that can upload one check-in.
#[async_trait]
pub trait CheckinUploader: Send + Sync {
    async fn upload_one(&self, record: &PendingCheckin, options: UploadOptions) -> UploadOutcome;
}

#[async_trait]
impl CheckinUploader for AuthorizedClient {
    async fn upload_one(&self, record: &PendingCheckin, options: UploadOptions) -> UploadOutcome {
        let body = match serde_json::to_value(record.to_payload()) {
            Ok(body) => body,
            Err(e) => {
                return UploadOutcome::Failed {
                    status: 0,
                    message: e.to_string(),
                }
            }
        };

        let result = self
            .send_with(
                Method::POST,
                CHECKIN_PATH,
                Some(&body),
                !options.attempt_without_token,
            )
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                let status = response.status().as_u16();
                let accepted = response.json::<CheckinAccepted>().await.ok();
                UploadOutcome::Uploaded {
                    status,
                    server_id: accepted.and_then(|a| a.id),
                }
            }
            Ok(response) => {
                let status = response.status().as_u16();
                let message = error_message(response).await;
                UploadOutcome::Failed { status, message }
            }
            Err(ApiError::Unauthorized) => UploadOutcome::Failed {
                status: 401,
                message: "Not logged in or session expired, please log in again".to_string(),
            },
            Err(e) => UploadOutcome::Failed {
                status: e.status(),
                message: e.to_string(),
            },
        }
    }
}

/// Counts from one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub attempted: usize,
    pub uploaded: usize,
    pub failed: usize,
}

/// Flushes the local queue to the server.
///
/// Clones share one pass lock, so a background sync and an opportunistic
/// flush never upload the same record twice.
#[derive(Clone)]
pub struct SyncDrainer {
    store: LocalStore,
    uploader: Arc<dyn CheckinUploader>,
    pass: Arc<tokio::sync::Mutex<()>>,
}

impl SyncDrainer {
    pub fn new(store: LocalStore, uploader: Arc<dyn CheckinUploader>) -> Self {
        Self {
            store,
            uploader,
            pass: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn uploader(&self) -> &Arc<dyn CheckinUploader> {
        &self.uploader
    }

    /// Attempt every unsynced record once, in store order.
    ///
    /// A failed record stays unsynced and the pass moves on. Failures are
    /// logged only; this runs unattended.
    pub async fn drain(&self) -> DrainReport {
        let _pass = self.pass.lock().await;

        let pending = match self.store.unsynced_checkins() {
            Ok(pending) => pending,
            Err(e) => {
                tracing::warn!(error = %e, "Background sync failed to read queue");
                return DrainReport::default();
            }
        };

        let mut report = DrainReport::default();
        for record in pending {
            report.attempted += 1;

            match self
                .uploader
                .upload_one(&record, UploadOptions::default())
                .await
            {
                UploadOutcome::Uploaded { .. } => match self.store.mark_synced(record.id) {
                    Ok(_) => report.uploaded += 1,
                    Err(e) => {
                        // Accepted by the server but still unsynced locally,
                        // so a later pass uploads it again.
                        tracing::warn!(record_id = record.id, error = %e, "Failed to mark check-in synced");
                        report.failed += 1;
                    }
                },
                UploadOutcome::Failed { status, message } => {
                    tracing::warn!(record_id = record.id, status, error = %message, "Background sync upload failed");
                    report.failed += 1;
                }
            }
        }

        if report.attempted > 0 {
            tracing::info!(
                attempted = report.attempted,
                uploaded = report.uploaded,
                failed = report.failed,
                "Drain pass finished"
            );
        }
        report
    }
}

/// Background sync registration failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Background sync registration failed: {0}")]
pub struct SyncRegistrationError(pub String);

/// Platform hook that schedules a wake-up for the worker.
#[async_trait]
pub trait SyncRegistrar: Send + Sync {
    async fn register(&self, tag: &str) -> Result<(), SyncRegistrationError>;
}

/// Request a background sync, retrying with exponential backoff.
///
/// Returns false once every attempt failed; the record stays queued and the
/// next opportunistic drain picks it up.
pub async fn register_background_sync(
    registrar: &dyn SyncRegistrar,
    tag: &str,
    attempts: u32,
    backoff: Duration,
) -> bool {
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        match registrar.register(tag).await {
            Ok(()) => {
                tracing::debug!(tag, attempt, "Background sync registered");
                return true;
            }
            Err(e) if attempt < attempts => {
                let delay = backoff * 2u32.saturating_pow(attempt - 1);
                tracing::warn!(tag, attempt, error = %e, delay_ms = delay.as_millis() as u64, "Sync registration failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                tracing::warn!(tag, attempt, error = %e, "Sync registration failed, giving up");
            }
        }
    }
    false
}
