// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (authentication, cross-origin headers).

pub mod auth;
pub mod cors;

pub use auth::require_auth;
pub use cors::cors;
