// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Login, refresh and logout routes.
//!
//! The access token goes back in the JSON body; the refresh token only
//! ever travels as an httpOnly cookie.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::config::{Config, REFRESH_COOKIE_NAME};
use crate::db::RefreshGrant;
use crate::error::{AppError, Result};
use crate::middleware::auth::create_access_token;
use crate::models::{LoginRequest, LoginResponse, TokenResponse};
use crate::time_utils::now_millis;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
}

/// Exchange username and password for an access token and refresh cookie.
async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    let Ok(Json(request)) = body else {
        return Err(AppError::Unauthorized("invalid".to_string()));
    };

    if !credentials_match(&state.config, &request) {
        tracing::info!("Login rejected");
        return Err(AppError::Unauthorized("invalid".to_string()));
    }

    let user_reference = state.config.login_user_reference;
    let access_token = create_access_token(
        user_reference,
        &state.config.jwt_signing_key,
        state.config.access_token_ttl_secs,
    )?;

    let refresh_token = generate_refresh_token()?;
    state.db.grant_refresh(
        refresh_token.clone(),
        RefreshGrant {
            user_reference,
            expires_at_ms: refresh_expiry_ms(&state.config),
        },
    );

    tracing::info!(user_reference, "Login successful");

    Ok((
        jar.add(refresh_cookie(&state.config, refresh_token)),
        Json(LoginResponse {
            access_token,
            expires_in: state.config.access_token_ttl_secs,
            user_reference: Some(user_reference),
        }),
    ))
}

/// Mint a new access token from the refresh cookie.
///
/// The cookie is re-issued with a fresh Max-Age.
async fn refresh(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<TokenResponse>)> {
    let token = jar
        .get(REFRESH_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::Unauthorized("no refresh".to_string()))?;

    let grant = state
        .db
        .refresh_grant(&token, now_millis())
        .ok_or_else(|| AppError::Unauthorized("invalid refresh".to_string()))?;

    let access_token = create_access_token(
        grant.user_reference,
        &state.config.jwt_signing_key,
        state.config.access_token_ttl_secs,
    )?;

    state.db.grant_refresh(
        token.clone(),
        RefreshGrant {
            user_reference: grant.user_reference,
            expires_at_ms: refresh_expiry_ms(&state.config),
        },
    );

    tracing::debug!(user_reference = grant.user_reference, "Access token refreshed");

    Ok((
        jar.add(refresh_cookie(&state.config, token)),
        Json(TokenResponse {
            access_token,
            expires_in: state.config.access_token_ttl_secs,
        }),
    ))
}

/// Revoke the refresh grant and clear the cookie.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, StatusCode) {
    if let Some(cookie) = jar.get(REFRESH_COOKIE_NAME) {
        state.db.revoke_refresh(cookie.value());
    }
    let removal = Cookie::build(REFRESH_COOKIE_NAME).path("/");
    (jar.remove(removal), StatusCode::NO_CONTENT)
}

fn credentials_match(config: &Config, request: &LoginRequest) -> bool {
    let user_ok = request
        .username
        .as_bytes()
        .ct_eq(config.login_username.as_bytes());
    let pass_ok = request
        .password
        .as_bytes()
        .ct_eq(config.login_password.as_bytes());
    (user_ok & pass_ok).into()
}

fn generate_refresh_token() -> anyhow::Result<String> {
    let mut bytes = [0u8; 32];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| anyhow::anyhow!("Failed to generate refresh token"))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

fn refresh_expiry_ms(config: &Config) -> i64 {
    now_millis() + config.refresh_token_ttl_secs * 1000
}

fn refresh_cookie(config: &Config, token: String) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(config.refresh_token_ttl_secs))
        .build()
}
