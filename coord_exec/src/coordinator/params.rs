//! # Coordinator Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::track_ctrl;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Coordinator parameters, loaded from `coord.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Target period of one control cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Size of the camera frames. The width also sets the tracking reference.
    ///
    /// Units: pixels
    pub frame_width: u32,
    pub frame_height: u32,

    /// Mirror frames horizontally before handing them to the video service.
    pub flip_frame: bool,

    /// Smoothing factor of the position/heading estimate, 1 disables smoothing.
    pub estimate_alpha: f64,

    /// Time to wait for the first IMU sample at startup.
    ///
    /// Units: seconds
    pub sensor_detect_timeout_s: f64,

    /// Target tracking parameters.
    pub track_ctrl: track_ctrl::Params,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            cycle_period_s: 0.05,
            frame_width: 640,
            frame_height: 480,
            flip_frame: true,
            estimate_alpha: 0.3,
            sensor_detect_timeout_s: 5.0,
            track_ctrl: track_ctrl::Params::default(),
        }
    }
}
