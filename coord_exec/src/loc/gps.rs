//! # GPS fixes
//!
//! A report from the receiver is only a position when the receiver says it has at least a 2D fix.
//! Without one the position is absent, never `(0, 0)`, since that is a real place on Earth.

use comms_if::eqpt::gps::GpsReport;
use serde::Serialize;

/// The fix mode reported by the receiver.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum FixMode {
    NoFix,
    Fix2d,
    Fix3d,
}

/// A valid position fix.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct GpsFix {
    pub lat: f64,
    pub lon: f64,
    pub mode: FixMode,
}

impl FixMode {
    pub fn from_raw(mode: u8) -> Self {
        match mode {
            0 | 1 => FixMode::NoFix,
            2 => FixMode::Fix2d,
            _ => FixMode::Fix3d,
        }
    }
}

impl GpsFix {
    /// Get the fix from a report, if the report holds one.
    pub fn from_report(report: &GpsReport) -> Option<Self> {
        let mode = FixMode::from_raw(report.mode);

        if mode == FixMode::NoFix {
            return None;
        }

        match (report.lat, report.lon) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => {
                Some(Self { lat, lon, mode })
            }
            _ => None,
        }
    }
}
