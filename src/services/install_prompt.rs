//! Deferred app-install prompt.
//!
//! The platform offers an install prompt once; the UI may show it later.
//! Availability changes are published over a watch channel.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::watch;

/// What the user picked when the prompt was shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallChoice {
    Accepted,
    Dismissed,
}

/// A platform install prompt that was held back for later.
#[async_trait]
pub trait DeferredPrompt: Send {
    /// Show the prompt and wait for the user's choice.
    async fn prompt(self: Box<Self>) -> InstallChoice;
}

/// Owns the single deferred prompt, if any.
pub struct InstallPrompt {
    deferred: Mutex<Option<Box<dyn DeferredPrompt>>>,
    available: watch::Sender<bool>,
}

impl Default for InstallPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallPrompt {
    pub fn new() -> Self {
        let (available, _) = watch::channel(false);
        Self {
            deferred: Mutex::new(None),
            available,
        }
    }

    /// Hold on to a prompt offered by the platform. Replaces any earlier one.
    pub fn offer(&self, prompt: Box<dyn DeferredPrompt>) {
        *self.slot() = Some(prompt);
        self.available.send_replace(true);
        tracing::debug!("Install prompt available");
    }

    /// Receiver that starts at the current availability.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.available.subscribe()
    }

    pub fn is_available(&self) -> bool {
        self.slot().is_some()
    }

    /// Show the held prompt. Returns true if the user accepted.
    ///
    /// The prompt can only be used once; without one this returns false.
    pub async fn install(&self) -> bool {
        let Some(prompt) = self.slot().take() else {
            return false;
        };

        let choice = prompt.prompt().await;
        self.available.send_replace(false);
        tracing::info!(?choice, "Install prompt answered");
        choice == InstallChoice::Accepted
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Box<dyn DeferredPrompt>>> {
        self.deferred
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
