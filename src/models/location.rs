//! Location model mirrored from the server location list.

use geo::Point;
use serde::{Deserialize, Serialize};

/// A server-known check-in location.
///
/// The wire form uses the short `lat`/`lng`/`radius` names of the
/// locations endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSnapshot {
    /// Server-assigned id (primary key)
    pub id: i64,
    pub name: String,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lng")]
    pub longitude: f64,
    /// Allowed check-in radius in meters
    #[serde(rename = "radius")]
    pub allowed_radius: f64,
}

impl LocationSnapshot {
    /// Location center as a point (x = longitude, y = latitude).
    pub fn point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}
