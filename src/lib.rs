// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! NFC Checkin: offline-first check-in client core and its REST backend.
//!
//! The client side keeps working without connectivity: check-ins are
//! queued in a local store and drained later, the access token is
//! refreshed transparently, and a service worker arbitrates between the
//! network and versioned caches. The server side provides the REST
//! contract the client talks to.

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod offline;
pub mod routes;
pub mod services;
pub mod time_utils;
pub mod worker;

use config::Config;
use db::ServerDb;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: ServerDb,
}
