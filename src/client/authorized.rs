// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authorized request channel.
//!
//! Every request carries the current bearer token. A 401 answer gets
//! exactly one retry after a refresh; a second rejection logs the user out.

use reqwest::{Method, StatusCode};

use super::api::{ApiClient, ApiError, PROTECTED_PATH};
use crate::services::token::TokenManager;

#[derive(Clone)]
pub struct AuthorizedClient {
    api: ApiClient,
    tokens: TokenManager,
}

impl AuthorizedClient {
    pub fn new(api: ApiClient, tokens: TokenManager) -> Self {
        Self { api, tokens }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Send a request that requires a valid token.
    ///
    /// Fails with [`ApiError::Unauthorized`] without touching the network
    /// if no valid token can be obtained.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, ApiError> {
        self.send_with(method, path, body, true).await
    }

    /// Like [`send`](Self::send), but with `require_token = false` the
    /// request goes out even without a token and the server's answer
    /// decides.
    pub async fn send_with(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        require_token: bool,
    ) -> Result<reqwest::Response, ApiError> {
        let ready = self.tokens.ensure_valid().await;
        if !ready && require_token {
            return Err(ApiError::Unauthorized);
        }

        let token = self.tokens.bearer();
        let response = self.send_once(&method, path, body, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        // ─── One retry with a refreshed token ────────────────────
        tracing::info!(path, "Request rejected with 401, refreshing token and retrying");

        let refreshed = match token.as_deref() {
            Some(rejected) => self.tokens.refresh_rejected(rejected).await,
            None => false,
        };
        if !refreshed {
            self.tokens.logout();
            return Err(ApiError::Unauthorized);
        }

        let retry_token = self.tokens.bearer();
        let retry = self
            .send_once(&method, path, body, retry_token.as_deref())
            .await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(path, "Request still unauthorized after refresh, logging out");
            self.tokens.logout();
            return Err(ApiError::Unauthorized);
        }

        Ok(retry)
    }

    async fn send_once(
        &self,
        method: &Method,
        path: &str,
        body: Option<&serde_json::Value>,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut request = self.api.http().request(method.clone(), self.api.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// Probe the protected endpoint. `Ok(true)` when the session is accepted.
    pub async fn protected(&self) -> Result<bool, ApiError> {
        match self.send(Method::GET, PROTECTED_PATH, None).await {
            Ok(response) => Ok(response.status().is_success()),
            Err(ApiError::Unauthorized) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
