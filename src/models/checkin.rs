// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Check-in records: the locally queued form and the upload wire form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A check-in captured on the device, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCheckin {
    pub user_reference: i64,
    pub location_reference: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// ISO-8601 capture time; must parse as RFC 3339.
    pub checkin_timestamp: String,
}

impl NewCheckin {
    /// Capture a check-in stamped with the current time.
    pub fn now(
        user_reference: i64,
        location_reference: i64,
        coordinates: Option<(f64, f64)>,
    ) -> Self {
        Self {
            user_reference,
            location_reference,
            latitude: coordinates.map(|(lat, _)| lat),
            longitude: coordinates.map(|(_, lng)| lng),
            checkin_timestamp: crate::time_utils::format_utc_rfc3339(Utc::now()),
        }
    }
}

/// A check-in held in the local store.
///
/// Records are only ever mutated by setting `synced` after the server
/// confirmed acceptance. Synced records stay in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCheckin {
    pub id: i64,
    pub user_reference: i64,
    pub location_reference: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub checkin_timestamp: String,
    #[serde(default)]
    pub synced: bool,
}

impl PendingCheckin {
    /// Parsed capture time.
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        crate::time_utils::parse_rfc3339_utc(&self.checkin_timestamp)
    }

    /// Coordinates as a pair, when both are present.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }

    /// Body sent to `POST /auth/checkin`.
    pub fn to_payload(&self) -> CheckinPayload {
        CheckinPayload {
            user_reference: self.user_reference,
            location_reference: self.location_reference,
            latitude: self.latitude,
            longitude: self.longitude,
            checkin_time: self.checkin_timestamp.clone(),
        }
    }
}

/// Upload body for the check-in endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinPayload {
    pub user_reference: i64,
    pub location_reference: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub checkin_time: String,
}

/// Successful response from the check-in endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckinAccepted {
    pub success: bool,
    pub id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_uses_wire_names() {
        let record = PendingCheckin {
            id: 7,
            user_reference: 1,
            location_reference: 3,
            latitude: Some(25.03),
            longitude: None,
            checkin_timestamp: "2026-01-02T03:04:05Z".to_string(),
            synced: false,
        };

        let json = serde_json::to_value(record.to_payload()).unwrap();
        assert_eq!(json["userReference"], 1);
        assert_eq!(json["locationReference"], 3);
        assert_eq!(json["latitude"], 25.03);
        assert!(json["longitude"].is_null());
        assert_eq!(json["checkinTime"], "2026-01-02T03:04:05Z");
        assert!(json.get("synced").is_none());
    }

    #[test]
    fn test_captured_at_parses_rfc3339() {
        let mut record = PendingCheckin {
            id: 1,
            user_reference: 1,
            location_reference: 1,
            latitude: None,
            longitude: None,
            checkin_timestamp: "2026-01-02T03:04:05+08:00".to_string(),
            synced: false,
        };
        assert!(record.captured_at().is_some());

        record.checkin_timestamp = "yesterday".to_string();
        assert!(record.captured_at().is_none());
    }
}
