// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The platform side of the worker: controlled pages and notifications.

use async_trait::async_trait;
use serde::Serialize;

/// Message posted from the worker to every controlled page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Activation finished; the page decides whether to reload.
    #[serde(rename_all = "camelCase")]
    Activated {
        version: String,
        reload_advised: bool,
    },
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum HostError {
    #[error("Notification permission denied")]
    PermissionDenied,

    #[error("Host error: {0}")]
    Other(String),
}

/// Hosting platform operations the worker relies on.
#[async_trait]
pub trait WorkerHost: Send + Sync {
    /// Ask to activate without waiting for older instances to go away.
    async fn skip_waiting(&self);

    /// Take control of every open page. Returns how many were claimed.
    async fn claim_clients(&self) -> usize;

    /// Post to every controlled page. Returns how many received it.
    async fn post_message(&self, message: ClientMessage) -> usize;

    async fn show_notification(&self, title: &str, body: &str) -> Result<(), HostError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activated_message_shape() {
        let message = ClientMessage::Activated {
            version: "v1".to_string(),
            reload_advised: true,
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            serde_json::json!({"type": "activated", "version": "v1", "reloadAdvised": true})
        );
    }
}
