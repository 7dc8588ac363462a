// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access credential and the auth endpoint request/response shapes.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// The in-memory access token and its expiry.
///
/// `token` is empty and `expires_at_ms` is 0 only when logged out. The
/// refresh credential is never part of this model; it lives in the
/// transport's cookie jar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessCredential {
    pub token: String,
    /// Expiry as epoch milliseconds
    pub expires_at_ms: i64,
    /// Opaque user reference returned by login, if any
    #[serde(default)]
    pub user_reference: Option<i64>,
}

impl AccessCredential {
    /// Build a credential from a server-declared lifetime in seconds.
    pub fn issued_now(token: String, expires_in_secs: i64, user_reference: Option<i64>) -> Self {
        Self {
            token,
            expires_at_ms: Utc::now().timestamp_millis() + expires_in_secs * 1000,
            user_reference,
        }
    }

    pub fn is_logged_out(&self) -> bool {
        self.token.is_empty() || self.expires_at_ms == 0
    }

    /// Milliseconds until expiry (negative once expired).
    pub fn remaining_ms(&self, now_ms: i64) -> i64 {
        self.expires_at_ms - now_ms
    }
}

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Response of `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    /// Declared access token lifetime in seconds
    pub expires_in: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_reference: Option<i64>,
}

/// Response of `POST /auth/refresh`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
}
