//! Parameters structure for TrackCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use crate::pid::{PidGains, PidParams};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for target tracking.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Params {
    // ---- GEOMETRY ----
    /// Width of the camera frame the detections are given in.
    ///
    /// Units: pixels
    pub frame_width: u32,

    /// Negate the yaw output, for robots whose steering is mounted the other way round.
    pub invert_yaw: bool,

    // ---- CONTROLLERS ----
    /// Yaw axis controller, output in steering units.
    pub yaw_pid: PidParams,

    /// Forward/backward axis controller, output in speed units.
    pub fb_pid: PidParams,

    // ---- TARGET AREA ----
    /// Initial desired target area.
    ///
    /// Units: pixels
    pub desired_area: f64,

    /// Change applied by one area increase or decrease.
    pub area_step: f64,

    pub min_area: f64,

    pub max_area: f64,

    // ---- CENTER OFFSET ----
    /// Change applied by one center move.
    ///
    /// Units: pixels
    pub offset_step: f64,

    /// The offset is limited to `[-max_offset, max_offset]`.
    pub max_offset: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            frame_width: 640,
            invert_yaw: false,
            yaw_pid: PidParams::new(PidGains::new(0.5, 0.0001, 0.25), 30.0),
            fb_pid: PidParams::new(PidGains::new(0.6, 0.0001, 0.1), 1.0),
            desired_area: 5000.0,
            area_step: 100.0,
            min_area: 3000.0,
            max_area: 9000.0,
            offset_step: 10.0,
            max_offset: 320.0,
        }
    }
}
