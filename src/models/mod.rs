// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod checkin;
pub mod credential;
pub mod location;

pub use checkin::{CheckinAccepted, CheckinPayload, NewCheckin, PendingCheckin};
pub use credential::{AccessCredential, LoginRequest, LoginResponse, TokenResponse};
pub use location::LocationSnapshot;
