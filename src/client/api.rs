// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! REST API client for the check-in backend.
//!
//! Handles:
//! - Login and token refresh (the refresh cookie stays in the cookie jar)
//! - Location list fetching
//! - Error message extraction from JSON error bodies

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::models::{LocationSnapshot, LoginRequest, LoginResponse, TokenResponse};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const CHECKIN_PATH: &str = "/auth/checkin";
pub const LOCATIONS_PATH: &str = "/auth/locations";
pub const PROTECTED_PATH: &str = "/protected";

/// Client-side API failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Not logged in or session expired")]
    Unauthorized,

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// HTTP-shaped status; 0 means the request never got an answer.
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Network(_) | ApiError::Decode(_) => 0,
            ApiError::Unauthorized => 401,
            ApiError::Status { status, .. } => *status,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// The two calls the token manager needs from the auth server.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError>;

    /// Mint a new access token from the ambient refresh credential.
    async fn refresh(&self) -> Result<TokenResponse, ApiError>;
}

/// HTTP client bound to one API base URL.
///
/// All clones share one connection pool and one cookie jar, so the
/// refresh cookie set by login is sent by every later refresh.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Fetch the full location list.
    pub async fn locations(&self) -> Result<Vec<LocationSnapshot>, ApiError> {
        let response = self.http.get(self.url(LOCATIONS_PATH)).send().await?;
        check_response_json(response).await
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        let response = self
            .http
            .post(self.url(LOGIN_PATH))
            .json(request)
            .send()
            .await?;

        check_response_json(response).await
    }

    async fn refresh(&self) -> Result<TokenResponse, ApiError> {
        let response = self.http.post(self.url(REFRESH_PATH)).send().await?;
        check_response_json(response).await
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Check response status and parse the JSON body.
pub async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, ApiError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    if !status.is_success() {
        let message = error_message(response).await;
        return Err(ApiError::Status {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

/// Pull a human-readable message out of an error response.
///
/// Uses the JSON `message` field when present, otherwise a generic
/// "upload failed (HTTP n)" text.
pub async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    message_from_body(status, &body)
}

fn message_from_body(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("Upload failed (HTTP {})", status.as_u16()))
}
