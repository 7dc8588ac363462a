// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! NFC Checkin API Server
//!
//! Serves login/refresh, check-in upload and the location list for the
//! offline-first check-in client.

use nfc_checkin::{config::Config, db::ServerDb, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(
        port = config.port,
        origins = ?config.allowed_origins,
        access_ttl = config.access_token_ttl_secs,
        "Starting NFC Checkin API"
    );

    // Load the location list
    let locations = match &config.locations_file {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading locations");
            ServerDb::load_locations(path).expect("Failed to load locations")
        }
        None => {
            tracing::warn!("LOCATIONS_FILE not set, serving an empty location list");
            Vec::new()
        }
    };
    tracing::info!(count = locations.len(), "Locations loaded");

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db: ServerDb::new(locations),
    });

    // Build router
    let app = nfc_checkin::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("nfc_checkin=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
