// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - offline core logic.

pub mod checkin;
pub mod geo;
pub mod install_prompt;
pub mod sync;
pub mod token;

pub use checkin::{CheckinError, CheckinService, LocationSource, SubmitOutcome};
pub use install_prompt::{DeferredPrompt, InstallChoice, InstallPrompt};
pub use sync::{
    register_background_sync, CheckinUploader, DrainReport, SyncDrainer, SyncRegistrar,
    SyncRegistrationError, UploadOptions, UploadOutcome,
};
pub use token::{AuthError, CredentialStore, TokenManager};
