// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use nfc_checkin::config::{ClientConfig, Config};
use nfc_checkin::db::ServerDb;
use nfc_checkin::middleware::auth::create_access_token;
use nfc_checkin::models::LocationSnapshot;
use nfc_checkin::routes::create_router;
use nfc_checkin::AppState;
use std::net::SocketAddr;
use std::sync::Arc;

/// Locations seeded into every test server.
#[allow(dead_code)]
pub fn sample_locations() -> Vec<LocationSnapshot> {
    vec![
        LocationSnapshot {
            id: 1,
            name: "Main Gate".to_string(),
            latitude: 25.0330,
            longitude: 121.5654,
            allowed_radius: 100.0,
        },
        LocationSnapshot {
            id: 2,
            name: "Library".to_string(),
            latitude: 25.0340,
            longitude: 121.5660,
            allowed_radius: 50.0,
        },
    ]
}

/// Build the shared state for tests.
#[allow(dead_code)]
pub fn test_state(config: Config) -> Arc<AppState> {
    Arc::new(AppState {
        config,
        db: ServerDb::new(sample_locations()),
    })
}

/// Create a test app with default test config.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with_config(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with_config(config: Config) -> (axum::Router, Arc<AppState>) {
    let state = test_state(config);
    (create_router(state.clone()), state)
}

/// Create an access token the way login does.
#[allow(dead_code)]
pub fn create_test_jwt(user_reference: i64, signing_key: &[u8]) -> String {
    create_access_token(user_reference, signing_key, 3600).expect("Failed to create JWT")
}

/// Serve the app on an ephemeral local port.
/// Returns the API base URL (`http://127.0.0.1:port/api`) and the state.
#[allow(dead_code)]
pub async fn spawn_server(config: Config) -> (String, Arc<AppState>) {
    let state = test_state(config);
    let app = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr: SocketAddr = listener.local_addr().expect("No local address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server failed");
    });

    (format!("http://{}/api", addr), state)
}

/// Client config pointing at a test server.
#[allow(dead_code)]
pub fn test_client_config(api_base: &str) -> ClientConfig {
    ClientConfig {
        api_base: api_base.to_string(),
        ..ClientConfig::default()
    }
}
