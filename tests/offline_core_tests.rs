// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Building the client core from configuration and restarting it.

use async_trait::async_trait;
use nfc_checkin::config::Config;
use nfc_checkin::models::NewCheckin;
use nfc_checkin::offline::OfflineCore;
use nfc_checkin::services::SubmitOutcome;
use nfc_checkin::worker::{ClientMessage, HostError, WorkerHost};
use std::sync::Arc;

mod common;

struct NoopHost;

#[async_trait]
impl WorkerHost for NoopHost {
    async fn skip_waiting(&self) {}

    async fn claim_clients(&self) -> usize {
        0
    }

    async fn post_message(&self, _message: ClientMessage) -> usize {
        0
    }

    async fn show_notification(&self, _title: &str, _body: &str) -> Result<(), HostError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_core_from_config_survives_restart() {
    let server_config = Config {
        access_token_ttl_secs: 3600,
        ..Config::test_default()
    };
    let (api_base, state) = common::spawn_server(server_config).await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = common::test_client_config(&api_base);
    config.db_path = dir.path().join("client").join("checkin.db");

    let core = OfflineCore::from_config(config.clone(), Arc::new(NoopHost)).unwrap();
    assert!(!core.tokens().is_logged_in());

    core.tokens().login("user", "pass").await.unwrap();
    let user = core.tokens().user_reference();
    core.start().await.unwrap();
    assert_eq!(core.store().all_locations().unwrap().len(), 2);

    let outcome = core
        .checkins()
        .submit(NewCheckin::now(1, 2, None))
        .await
        .unwrap();
    assert!(matches!(outcome, SubmitOutcome::Uploaded { .. }));
    assert_eq!(state.db.checkins().len(), 1);
    drop(core);

    // Same database file: session and queue come back.
    let core = OfflineCore::from_config(config, Arc::new(NoopHost)).unwrap();
    assert!(core.tokens().is_logged_in());
    assert_eq!(core.tokens().user_reference(), user);

    let records = core.store().all_checkins().unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].synced);
    assert_eq!(core.store().all_locations().unwrap().len(), 2);

    assert!(core.client().protected().await.unwrap());
}

#[tokio::test]
async fn test_core_starts_with_server_unreachable() {
    let dir = tempfile::tempdir().unwrap();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead = format!("http://{}/api", listener.local_addr().unwrap());
    drop(listener);

    let mut config = common::test_client_config(&dead);
    config.db_path = dir.path().join("checkin.db");

    let core = OfflineCore::from_config(config, Arc::new(NoopHost)).unwrap();
    core.start().await.unwrap();
    assert!(core.store().all_locations().unwrap().is_empty());

    // Not logged in: queued, and a background sync is waiting.
    let outcome = core
        .checkins()
        .submit(NewCheckin::now(1, 1, None))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        SubmitOutcome::Queued {
            sync_registered: true,
            ..
        }
    ));
    assert_eq!(core.worker().pending_syncs(), vec!["sync-checkins"]);
}
