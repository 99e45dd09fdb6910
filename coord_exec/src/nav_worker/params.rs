//! Parameters structure for the navigation worker

use serde::Deserialize;

use crate::pid::{PidGains, PidParams};

/// Navigation parameters, loaded from `nav.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Heading error controller, output mapped onto the steer axis.
    ///
    /// Units of error: degrees
    pub heading_pid: PidParams,

    /// Distance controller, output mapped onto the drive axis.
    ///
    /// Units of error: meters
    pub distance_pid: PidParams,

    /// Negate the steer output.
    pub invert_steer: bool,

    /// A waypoint is reached when the robot is closer than this.
    ///
    /// Units: meters
    pub arrival_radius_m: f64,

    /// Poses older than this are not navigated on.
    ///
    /// Units: seconds
    pub pose_timeout_s: f64,

    /// Period of the worker when no pose arrives.
    ///
    /// Units: seconds
    pub period_s: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            heading_pid: PidParams::new(PidGains::new(0.5, 0.0, 0.1), 30.0),
            distance_pid: PidParams::new(PidGains::new(0.2, 0.0, 0.0), 1.0),
            invert_steer: false,
            arrival_radius_m: 2.0,
            pose_timeout_s: 2.0,
            period_s: 0.1,
        }
    }
}
