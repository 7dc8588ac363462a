// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{http::StatusCode, response::IntoResponse};
use nfc_checkin::error::AppError;
use serde_json::{json, Value};

async fn render(err: AppError) -> (StatusCode, Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_unauthorized_keeps_message() {
    let (status, body) = render(AppError::Unauthorized("no token".to_string())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"message": "no token"}));
}

#[tokio::test]
async fn test_validation_lists_errors() {
    let (status, body) = render(AppError::Validation(vec![
        "checkinTime is required".to_string(),
    ]))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"message": "invalid payload", "errors": ["checkinTime is required"]})
    );
}

#[tokio::test]
async fn test_internal_hides_details() {
    let (status, body) = render(AppError::Internal(anyhow::anyhow!("signing failed"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"message": "internal_error"}));
}
