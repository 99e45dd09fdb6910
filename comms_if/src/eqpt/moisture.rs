//! # Moisture Telemetry

use serde::{Deserialize, Serialize};

/// A moisture reading from a field sensor, published on `moisture/data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoistureMsg {
    /// Identifier of the sensor, its MAC address.
    pub mac: String,

    /// Moisture reading in sensor units.
    pub value: f64,
}

impl MoistureMsg {
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }
}
