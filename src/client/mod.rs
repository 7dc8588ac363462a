// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP clients for the check-in API.

pub mod api;
pub mod authorized;

pub use api::{ApiClient, ApiError, AuthApi};
pub use authorized::AuthorizedClient;
