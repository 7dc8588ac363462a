// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Check-in, location and protected API routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{CheckinAccepted, CheckinPayload, LocationSnapshot};
use crate::time_utils::{format_utc_rfc3339, parse_rfc3339_utc};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Routes that require a bearer token.
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/checkin", post(create_checkin))
        .route("/api/protected", get(protected))
}

/// Routes open to anyone.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/auth/locations", get(list_locations))
}

// ─── Check-ins ───────────────────────────────────────────────

/// Record a check-in.
async fn create_checkin(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<CheckinAccepted>> {
    let payload = match body {
        Ok(Json(value)) => validate_checkin(&value)?,
        Err(_) => {
            return Err(AppError::Validation(vec![
                "payload must be a JSON object".to_string()
            ]))
        }
    };

    if payload.user_reference != user.user_reference {
        tracing::warn!(
            token_user = user.user_reference,
            payload_user = payload.user_reference,
            "Check-in submitted for a different user reference"
        );
    }

    let location = payload.location_reference;
    let id = state.db.insert_checkin(payload);
    tracing::info!(id, location, user = user.user_reference, "Check-in recorded");

    Ok(Json(CheckinAccepted {
        success: true,
        id: Some(id),
    }))
}

/// Validate a raw check-in body, collecting every field error.
///
/// Numeric fields accept JSON numbers or numeric strings. Coordinates are
/// optional; the time must be an RFC 3339 timestamp and is normalized to
/// UTC.
pub fn validate_checkin(value: &Value) -> Result<CheckinPayload> {
    let Some(object) = value.as_object() else {
        return Err(AppError::Validation(vec![
            "payload must be a JSON object".to_string()
        ]));
    };

    let mut errors = Vec::new();

    let user_reference = required_reference(object, "userReference", &mut errors);
    let location_reference = required_reference(object, "locationReference", &mut errors);
    let latitude = optional_number(object, "latitude", &mut errors);
    let longitude = optional_number(object, "longitude", &mut errors);

    let checkin_time = match field(object, "checkinTime") {
        None => {
            errors.push("checkinTime is required".to_string());
            None
        }
        Some(raw) => match raw.as_str().and_then(parse_rfc3339_utc) {
            Some(time) => Some(format_utc_rfc3339(time)),
            None => {
                errors.push("checkinTime must be a valid ISO date string".to_string());
                None
            }
        },
    };

    match (user_reference, location_reference, checkin_time) {
        (Some(user_reference), Some(location_reference), Some(checkin_time))
            if errors.is_empty() =>
        {
            Ok(CheckinPayload {
                user_reference,
                location_reference,
                latitude,
                longitude,
                checkin_time,
            })
        }
        _ => Err(AppError::Validation(errors)),
    }
}

/// A present, non-null field.
fn field<'a>(object: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    object.get(name).filter(|v| !v.is_null())
}

fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if !s.trim().is_empty() => s.trim().parse().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

fn required_reference(
    object: &Map<String, Value>,
    name: &str,
    errors: &mut Vec<String>,
) -> Option<i64> {
    let Some(raw) = field(object, name) else {
        errors.push(format!("{name} is required"));
        return None;
    };
    match as_number(raw) {
        Some(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => Some(n as i64),
        _ => {
            errors.push(format!("{name} must be a number"));
            None
        }
    }
}

fn optional_number(
    object: &Map<String, Value>,
    name: &str,
    errors: &mut Vec<String>,
) -> Option<f64> {
    let raw = field(object, name)?;
    let number = as_number(raw);
    if number.is_none() {
        errors.push(format!("{name} must be a number"));
    }
    number
}

// ─── Locations ───────────────────────────────────────────────

async fn list_locations(State(state): State<Arc<AppState>>) -> Json<Vec<LocationSnapshot>> {
    Json(state.db.locations())
}

// ─── Protected probe ─────────────────────────────────────────

#[derive(Serialize)]
pub struct ProtectedResponse {
    pub ok: bool,
    pub data: String,
}

async fn protected(Extension(user): Extension<AuthUser>) -> Json<ProtectedResponse> {
    tracing::debug!(user = user.user_reference, "Protected resource accessed");
    Json(ProtectedResponse {
        ok: true,
        data: "protected content".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn errors(value: Value) -> Vec<String> {
        match validate_checkin(&value) {
            Err(AppError::Validation(errors)) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_payload_is_normalized() {
        let payload = validate_checkin(&json!({
            "userReference": "12",
            "locationReference": 3,
            "latitude": 25.033,
            "longitude": null,
            "checkinTime": "2026-05-01T17:00:00+08:00"
        }))
        .unwrap();

        assert_eq!(payload.user_reference, 12);
        assert_eq!(payload.location_reference, 3);
        assert_eq!(payload.latitude, Some(25.033));
        assert_eq!(payload.longitude, None);
        assert_eq!(payload.checkin_time, "2026-05-01T09:00:00.000Z");
    }

    #[test]
    fn test_every_error_is_reported() {
        let errors = errors(json!({
            "locationReference": "abc",
            "latitude": "north",
            "checkinTime": "yesterday"
        }));
        assert_eq!(
            errors,
            vec![
                "userReference is required",
                "locationReference must be a number",
                "latitude must be a number",
                "checkinTime must be a valid ISO date string",
            ]
        );
    }

    #[test]
    fn test_non_object_rejected() {
        assert_eq!(errors(json!([1, 2])), vec!["payload must be a JSON object"]);
    }
}
