//! # Heading estimation
//!
//! Heading is computed from a single accelerometer and magnetometer sample. The accelerometer
//! gives the pitch and roll of the platform, which are used to project the magnetometer vector
//! back onto the horizontal plane before taking the angle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::imu::SensorSample;
use nalgebra::Vector3;
use serde::Serialize;
use util::maths::norm_deg_360;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The result of a heading computation.
///
/// When `error` is set the heading is not available and `deg` is reported as 0.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct HeadingReading {
    /// Compass heading in degrees, in `[0, 360)`.
    pub deg: f64,

    pub error: Option<HeadingError>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum HeadingError {
    #[error("Accelerometer magnitude is zero")]
    ZeroAcceleration,

    #[error("IMU sample contains non-finite values")]
    NonFinite,

    #[error("No IMU sample has been received")]
    NoSample,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl HeadingReading {
    fn error(e: HeadingError) -> Self {
        Self { deg: 0.0, error: Some(e) }
    }

    /// A reading for a cycle in which no sample has been received yet.
    pub fn unavailable() -> Self {
        Self::error(HeadingError::NoSample)
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    /// The heading, if it is available.
    pub fn valid_deg(&self) -> Option<f64> {
        match self.error {
            None => Some(self.deg),
            Some(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Compute the tilt compensated heading from a sample.
pub fn compute_heading(sample: &SensorSample) -> HeadingReading {
    let acc = Vector3::from(sample.acc);
    let mag = Vector3::from(sample.mag);

    if acc.iter().chain(mag.iter()).any(|v| !v.is_finite()) {
        return HeadingReading::error(HeadingError::NonFinite);
    }

    let acc_mag = acc.norm();
    if acc_mag == 0.0 {
        return HeadingReading::error(HeadingError::ZeroAcceleration);
    }
    let acc_n = acc / acc_mag;

    let pitch = acc_n[0].asin();
    let cos_pitch = pitch.cos();

    // Rounding can push the ratio fractionally past 1 near vertical
    let roll = if cos_pitch == 0.0 {
        0.0
    } else {
        -(acc_n[1] / cos_pitch).max(-1.0).min(1.0).asin()
    };

    let (sin_p, cos_p) = pitch.sin_cos();
    let (sin_r, cos_r) = roll.sin_cos();

    let mag_x_comp = mag[0] * cos_p + mag[2] * sin_p;
    let mag_y_comp = mag[0] * sin_r * sin_p + mag[1] * cos_r - mag[2] * sin_r * cos_p;

    HeadingReading {
        deg: norm_deg_360(mag_y_comp.atan2(mag_x_comp).to_degrees()),
        error: None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample(acc: [f64; 3], mag: [f64; 3]) -> SensorSample {
        SensorSample { acc, mag }
    }

    #[test]
    fn test_level_headings() {
        let cases = [
            ([1.0, 0.0, 0.0], 0.0),
            ([0.0, 1.0, 0.0], 90.0),
            ([-1.0, 0.0, 0.0], 180.0),
            ([0.0, -1.0, 0.0], 270.0),
        ];

        for (mag, expected) in cases.iter() {
            let h = compute_heading(&sample([0.0, 0.0, 1.0], *mag));
            assert!(h.is_valid());
            assert!((h.deg - expected).abs() < 1e-9, "{:?} -> {}", mag, h.deg);
            assert!(h.deg >= 0.0 && h.deg < 360.0);
        }
    }

    #[test]
    fn test_zero_acceleration_is_flagged() {
        let h = compute_heading(&sample([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]));
        assert_eq!(h.deg, 0.0);
        assert_eq!(h.error, Some(HeadingError::ZeroAcceleration));
        assert_eq!(h.valid_deg(), None);

        let h = compute_heading(&sample([0.0, f64::NAN, 1.0], [1.0, 0.0, 0.0]));
        assert_eq!(h.error, Some(HeadingError::NonFinite));
    }

    #[test]
    fn test_vertical_platform() {
        // Pitched straight up, cos(pitch) is ~0 and the roll term must not blow up
        let h = compute_heading(&sample([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]));
        assert!(h.is_valid());
        assert!(h.deg.is_finite());
    }
}
