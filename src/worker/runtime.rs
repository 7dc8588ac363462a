//! Event loop hosting a [`ServiceWorker`].
//!
//! Events arrive over a channel and each runs as its own task, so a slow
//! fetch never holds up a sync or another fetch. Callers that need the
//! outcome get it back over a oneshot once the handler settled.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::{
    ActivateReport, EventOutcome, FetchRequest, FetchResponse, InstallReport, ServiceWorker,
    WorkerEvent,
};
use crate::services::sync::{DrainReport, SyncRegistrar, SyncRegistrationError};

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    #[error("Worker runtime is not running")]
    Closed,

    #[error("Worker returned an unexpected outcome for {0}")]
    UnexpectedOutcome(&'static str),
}

struct Envelope {
    event: WorkerEvent,
    reply: oneshot::Sender<EventOutcome>,
}

pub struct WorkerRuntime;

impl WorkerRuntime {
    /// Start the event loop. It stops once every handle is dropped, and
    /// the worker becomes redundant.
    pub fn spawn(worker: Arc<ServiceWorker>) -> (WorkerHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Envelope>(EVENT_BUFFER);

        let task = tokio::spawn(async move {
            while let Some(Envelope { event, reply }) = rx.recv().await {
                let worker = worker.clone();
                tokio::spawn(async move {
                    let outcome = worker.dispatch(event).await;
                    // Caller may have stopped waiting.
                    let _ = reply.send(outcome);
                });
            }
            worker.retire();
            tracing::debug!("Worker runtime stopped");
        });

        let handle = WorkerHandle {
            tx,
            pending_syncs: Arc::new(Mutex::new(BTreeSet::new())),
        };
        (handle, task)
    }
}

/// Platform-side handle to a running worker.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<Envelope>,
    /// Sync tags registered and not yet fired
    pending_syncs: Arc<Mutex<BTreeSet<String>>>,
}

impl WorkerHandle {
    /// Deliver an event and wait for its handler to settle.
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { event, reply })
            .await
            .map_err(|_| RuntimeError::Closed)?;
        rx.await.map_err(|_| RuntimeError::Closed)
    }

    /// Run install, then activate.
    pub async fn start(&self) -> Result<(InstallReport, ActivateReport), RuntimeError> {
        let installed = match self.dispatch(WorkerEvent::Install).await? {
            EventOutcome::Installed(report) => report,
            _ => return Err(RuntimeError::UnexpectedOutcome("install")),
        };
        let activated = match self.dispatch(WorkerEvent::Activate).await? {
            EventOutcome::Activated(report) => report,
            _ => return Err(RuntimeError::UnexpectedOutcome("activate")),
        };
        Ok((installed, activated))
    }

    /// Route a page request through the worker. `None` means not
    /// intercepted.
    pub async fn fetch(&self, request: FetchRequest) -> Result<Option<FetchResponse>, RuntimeError> {
        match self.dispatch(WorkerEvent::Fetch(request)).await? {
            EventOutcome::Fetched(response) => Ok(response),
            _ => Err(RuntimeError::UnexpectedOutcome("fetch")),
        }
    }

    /// Tags waiting for connectivity.
    pub fn pending_syncs(&self) -> Vec<String> {
        self.pending().iter().cloned().collect()
    }

    /// Connectivity is back: fire every registered sync and wait for the
    /// drains to settle.
    pub async fn online(&self) -> Result<Vec<DrainReport>, RuntimeError> {
        let tags = std::mem::take(&mut *self.pending());

        let mut reports = Vec::new();
        for tag in tags {
            tracing::info!(tag = %tag, "Firing background sync");
            match self.dispatch(WorkerEvent::Sync(tag)).await? {
                EventOutcome::Synced(Some(report)) => reports.push(report),
                EventOutcome::Synced(None) => {}
                _ => return Err(RuntimeError::UnexpectedOutcome("sync")),
            }
        }
        Ok(reports)
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        self.pending_syncs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SyncRegistrar for WorkerHandle {
    /// Registering the same tag twice fires it once.
    async fn register(&self, tag: &str) -> Result<(), SyncRegistrationError> {
        if self.tx.is_closed() {
            return Err(SyncRegistrationError(RuntimeError::Closed.to_string()));
        }
        self.pending().insert(tag.to_string());
        Ok(())
    }
}
