// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Start-up wiring for the offline client core.
//!
//! Everything the UI needs is built once here and handed out by
//! reference; nothing lives in globals.

use std::sync::Arc;

use crate::client::{ApiClient, ApiError, AuthorizedClient};
use crate::config::{ClientConfig, ConfigError};
use crate::db::{LocalStore, StoreError};
use crate::services::{CheckinService, InstallPrompt, SyncDrainer, TokenManager};
use crate::worker::{
    ActivateReport, CacheStorage, FetchError, HttpNetwork, InstallReport, RuntimeError,
    ServiceWorker, WorkerError, WorkerHandle, WorkerHost, WorkerRuntime,
};

/// Start-up failures.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Network(#[from] FetchError),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

/// The assembled client core.
pub struct OfflineCore {
    config: ClientConfig,
    store: LocalStore,
    api: ApiClient,
    tokens: TokenManager,
    client: Arc<AuthorizedClient>,
    worker: WorkerHandle,
    checkins: CheckinService,
    install_prompt: InstallPrompt,
}

impl OfflineCore {
    /// Build from `CHECKIN_*` environment variables.
    pub fn from_env(host: Arc<dyn WorkerHost>) -> Result<Self, CoreError> {
        Self::from_config(ClientConfig::from_env()?, host)
    }

    /// Open the store, restore any persisted session and start the worker
    /// event loop. Must be called inside a Tokio runtime.
    pub fn from_config(config: ClientConfig, host: Arc<dyn WorkerHost>) -> Result<Self, CoreError> {
        let store = LocalStore::open_at(&config.db_path)?;
        let api = ApiClient::new(config.api_base.clone())?;

        let tokens = TokenManager::new(
            Arc::new(api.clone()),
            Arc::new(store.clone()),
            config.refresh_margin,
        );
        let restored = tokens.restore()?;

        let client = Arc::new(AuthorizedClient::new(api.clone(), tokens.clone()));
        let drainer = SyncDrainer::new(store.clone(), client.clone());

        let worker = ServiceWorker::new(
            config.clone(),
            CacheStorage::new(store.clone()),
            Arc::new(HttpNetwork::new()?),
            host,
            drainer.clone(),
        )?;
        let (worker, _task) = WorkerRuntime::spawn(Arc::new(worker));

        let checkins = CheckinService::new(
            store.clone(),
            drainer,
            Arc::new(worker.clone()),
            Arc::new(api.clone()),
            config.clone(),
        );

        tracing::info!(
            api_base = %config.api_base,
            db_path = %config.db_path.display(),
            restored,
            "Offline core ready"
        );

        Ok(Self {
            config,
            store,
            api,
            tokens,
            client,
            worker,
            checkins,
            install_prompt: InstallPrompt::new(),
        })
    }

    /// Install and activate the worker, then try to refresh the location
    /// mirror. An unreachable server leaves the previous mirror in place.
    pub async fn start(&self) -> Result<(InstallReport, ActivateReport), RuntimeError> {
        let reports = self.worker.start().await?;
        match self.checkins.refresh_locations().await {
            Ok(count) => tracing::info!(count, "Location mirror refreshed"),
            Err(e) => tracing::warn!(error = %e, "Keeping previous location mirror"),
        }
        Ok(reports)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn client(&self) -> &AuthorizedClient {
        &self.client
    }

    pub fn worker(&self) -> &WorkerHandle {
        &self.worker
    }

    pub fn checkins(&self) -> &CheckinService {
        &self.checkins
    }

    pub fn install_prompt(&self) -> &InstallPrompt {
        &self.install_prompt
    }
}
