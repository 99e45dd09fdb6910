//! # GPS Reports
//!
//! Reports from the GPS receiver, published on `gps/data` by the receiver driver. The `mode` field
//! follows the gpsd convention: 0 unknown, 1 no fix, 2 2D fix, 3 3D fix.

use serde::{Deserialize, Serialize};

/// A raw GPS report.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpsReport {
    /// Fix mode reported by the receiver.
    #[serde(default)]
    pub mode: u8,

    /// Latitude in degrees, if the receiver provided one.
    #[serde(default)]
    pub lat: Option<f64>,

    /// Longitude in degrees, if the receiver provided one.
    #[serde(default)]
    pub lon: Option<f64>,
}

impl GpsReport {
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }
}
