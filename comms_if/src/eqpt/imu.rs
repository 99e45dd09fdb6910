//! # IMU Samples
//!
//! Raw accelerometer and magnetometer vectors, published on `imu/data` by the IMU driver.

use serde::{Deserialize, Serialize};

/// One accelerometer and magnetometer sample in the sensor frame.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    /// Accelerometer vector `[x, y, z]`, raw units.
    pub acc: [f64; 3],

    /// Magnetometer vector `[x, y, z]`, raw units.
    pub mag: [f64; 3],
}

impl SensorSample {
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }
}
