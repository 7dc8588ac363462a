// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Service worker: cache/network arbitration for the app shell.
//!
//! The hosting platform drives the lifecycle (install, activate) and hands
//! over fetch, sync and push events. Each handler runs to completion before
//! its outcome is returned, which is what the platform waits on.

pub mod cache;
pub mod host;
pub mod network;
pub mod runtime;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use futures_util::future::join_all;
use reqwest::{Method, Url};

use crate::config::ClientConfig;
use crate::db::StoreError;
use crate::services::sync::{DrainReport, SyncDrainer};

pub use cache::{Cache, CacheStorage};
pub use host::{ClientMessage, HostError, WorkerHost};
pub use network::{
    canonical_url, fetch_with_deadline, FetchError, FetchRequest, FetchResponse, HttpNetwork,
    Network, RequestMode, ResponseType,
};
pub use runtime::{RuntimeError, WorkerHandle, WorkerRuntime};

/// Lifecycle state of a worker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    /// Installed and waiting to take over
    Installed,
    Activating,
    /// Activated and controlling pages
    Activated,
    Redundant,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Events delivered by the platform.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(FetchRequest),
    Sync(String),
    Push(Option<String>),
}

/// Result of handling one event.
#[derive(Debug, Clone)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    /// `None` when the request was not intercepted
    Fetched(Option<FetchResponse>),
    /// `None` when the tag is not ours
    Synced(Option<DrainReport>),
    Notified(bool),
}

/// Precache results of an install.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstallReport {
    pub cached: Vec<String>,
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivateReport {
    pub deleted: Vec<String>,
    pub claimed_clients: usize,
    pub reload_advised: bool,
}

pub struct ServiceWorker {
    config: ClientConfig,
    origin: Url,
    caches: CacheStorage,
    network: Arc<dyn Network>,
    host: Arc<dyn WorkerHost>,
    drainer: SyncDrainer,
    state: Mutex<WorkerState>,
}

impl ServiceWorker {
    pub fn new(
        config: ClientConfig,
        caches: CacheStorage,
        network: Arc<dyn Network>,
        host: Arc<dyn WorkerHost>,
        drainer: SyncDrainer,
    ) -> Result<Self, WorkerError> {
        let origin = Url::parse(&config.app_origin).map_err(|e| WorkerError::InvalidUrl {
            url: config.app_origin.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            config,
            origin,
            caches,
            network,
            host,
            drainer,
            state: Mutex::new(WorkerState::Parsed),
        })
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = state;
        tracing::debug!(?state, "Worker state changed");
    }

    pub fn caches(&self) -> &CacheStorage {
        &self.caches
    }

    /// Mark this instance as replaced. It stops intercepting.
    pub(crate) fn retire(&self) {
        self.set_state(WorkerState::Redundant);
    }

    pub async fn dispatch(&self, event: WorkerEvent) -> EventOutcome {
        match event {
            WorkerEvent::Install => EventOutcome::Installed(self.install().await),
            WorkerEvent::Activate => EventOutcome::Activated(self.activate().await),
            WorkerEvent::Fetch(request) => EventOutcome::Fetched(self.handle_fetch(&request).await),
            WorkerEvent::Sync(tag) => EventOutcome::Synced(self.handle_sync(&tag).await),
            WorkerEvent::Push(payload) => EventOutcome::Notified(self.handle_push(payload).await),
        }
    }

    /// Precache the app shell.
    ///
    /// Each manifest URL is fetched and stored on its own; a failing URL is
    /// reported and skipped, never failing the install.
    pub async fn install(&self) -> InstallReport {
        self.set_state(WorkerState::Installing);

        let precache_name = self.config.precache_name();
        let mut report = InstallReport::default();

        let precache = match self.caches.open(&precache_name) {
            Ok(cache) => Some(cache),
            Err(e) => {
                tracing::warn!(cache = %precache_name, error = %e, "Failed to open precache");
                None
            }
        };

        let precache = precache.as_ref();
        let attempts = self.config.precache_manifest.iter().map(|path| async move {
            let result = self.precache_one(precache, path).await;
            (path.clone(), result)
        });
        for (path, result) in join_all(attempts).await {
            match result {
                Ok(()) => report.cached.push(path),
                Err(reason) => {
                    tracing::warn!(path = %path, reason = %reason, "Precache failed for asset");
                    report.failed.push((path, reason));
                }
            }
        }

        tracing::info!(
            cache = %precache_name,
            cached = report.cached.len(),
            failed = report.failed.len(),
            "Install finished"
        );

        self.host.skip_waiting().await;
        self.set_state(WorkerState::Installed);
        report
    }

    async fn precache_one(&self, cache: Option<&Cache>, path: &str) -> Result<(), String> {
        let cache = cache.ok_or_else(|| "precache unavailable".to_string())?;
        let url = self.resolve(path).map_err(|e| e.to_string())?;
        let request = FetchRequest::get(url);

        let response = fetch_with_deadline(self.network.as_ref(), &request, self.config.fetch_timeout)
            .await
            .map_err(|e| e.to_string())?;
        if !response.is_cacheable() {
            return Err(format!("HTTP {}", response.status.as_u16()));
        }

        cache
            .put(&request.cache_key(), &response)
            .map_err(|e| e.to_string())
    }

    /// Evict stale generations, take control of open pages and tell them.
    pub async fn activate(&self) -> ActivateReport {
        self.set_state(WorkerState::Activating);

        let current: HashSet<String> =
            HashSet::from([self.config.precache_name(), self.config.runtime_name()]);
        let mut report = ActivateReport::default();

        match self.caches.keys() {
            Ok(names) => {
                for name in names.into_iter().filter(|n| !current.contains(n)) {
                    match self.caches.delete(&name) {
                        Ok(_) => {
                            tracing::info!(cache = %name, "Deleted stale cache generation");
                            report.deleted.push(name);
                        }
                        Err(e) => {
                            tracing::warn!(cache = %name, error = %e, "Failed to delete cache generation")
                        }
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to list cache generations"),
        }

        report.reload_advised = self.runtime_looks_stale();
        report.claimed_clients = self.host.claim_clients().await;
        self.set_state(WorkerState::Activated);

        self.host
            .post_message(ClientMessage::Activated {
                version: self.config.cache_version.clone(),
                reload_advised: report.reload_advised,
            })
            .await;

        tracing::info!(
            deleted = report.deleted.len(),
            clients = report.claimed_clients,
            reload_advised = report.reload_advised,
            "Activation finished"
        );
        report
    }

    /// True when the runtime generation holds no script; pages loaded
    /// before this version are then likely running stale code.
    fn runtime_looks_stale(&self) -> bool {
        let keys = self
            .caches
            .open(&self.config.runtime_name())
            .and_then(|cache| cache.keys());
        match keys {
            Ok(keys) => !keys.iter().any(|key| is_script(key)),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to inspect runtime cache");
                false
            }
        }
    }

    /// Whether this worker answers `request` at all.
    ///
    /// Only same-origin GETs outside the API prefix are intercepted.
    pub fn intercepts(&self, request: &FetchRequest) -> bool {
        self.state() == WorkerState::Activated
            && request.method == Method::GET
            && request.url.origin() == self.origin.origin()
            && !self.is_api_path(request.url.path())
    }

    /// `/api` itself or anything below `/api/`.
    fn is_api_path(&self, path: &str) -> bool {
        let prefix = &self.config.api_prefix;
        path.starts_with(prefix.as_str()) || path == prefix.trim_end_matches('/')
    }

    /// Network first, caches second.
    ///
    /// Returns `None` when the request is not intercepted and goes to the
    /// network untouched.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> Option<FetchResponse> {
        if !self.intercepts(request) {
            return None;
        }

        let key = request.cache_key();
        match fetch_with_deadline(self.network.as_ref(), request, self.config.fetch_timeout).await {
            Ok(response) => {
                if response.is_cacheable() {
                    self.store_runtime(&key, &response);
                }
                Some(response)
            }
            Err(e) => {
                tracing::debug!(url = %key, error = %e, "Network failed, falling back to cache");
                Some(self.fallback(request, &key))
            }
        }
    }

    fn store_runtime(&self, key: &str, response: &FetchResponse) {
        let result = self
            .caches
            .open(&self.config.runtime_name())
            .and_then(|cache| cache.put(key, response));
        if let Err(e) = result {
            tracing::warn!(url = %key, error = %e, "Failed to store runtime cache entry");
        }
    }

    fn fallback(&self, request: &FetchRequest, key: &str) -> FetchResponse {
        if let Some(hit) = self.lookup(key) {
            return hit;
        }

        if request.is_navigation() {
            let offline = self
                .resolve(&self.config.offline_document)
                .ok()
                .and_then(|url| self.lookup(&canonical_url(&url)));
            if let Some(hit) = offline {
                return hit;
            }
        }

        FetchResponse::service_unavailable()
    }

    fn lookup(&self, key: &str) -> Option<FetchResponse> {
        match self.caches.match_any(key) {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(url = %key, error = %e, "Cache lookup failed");
                None
            }
        }
    }

    /// Run the drainer for our sync tag. Returns once the drain settled.
    pub async fn handle_sync(&self, tag: &str) -> Option<DrainReport> {
        if tag != self.config.sync_tag {
            tracing::debug!(tag, "Ignoring unknown sync tag");
            return None;
        }
        Some(self.drainer.drain().await)
    }

    /// Show a notification for a push message. Returns whether it was shown.
    pub async fn handle_push(&self, payload: Option<String>) -> bool {
        let body = payload.unwrap_or_else(|| self.config.push_placeholder.clone());
        match self
            .host
            .show_notification(&self.config.notification_title, &body)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to show push notification");
                false
            }
        }
    }

    fn resolve(&self, path: &str) -> Result<Url, WorkerError> {
        self.origin.join(path).map_err(|e| WorkerError::InvalidUrl {
            url: path.to_string(),
            reason: e.to_string(),
        })
    }
}

fn is_script(key: &str) -> bool {
    let path = Url::parse(key)
        .map(|url| url.path().to_string())
        .unwrap_or_else(|_| key.to_string());
    path.ends_with(".js") || path.ends_with(".mjs")
}
