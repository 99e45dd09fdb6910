//! # Localisation module
//!
//! This module provides the robot with an idea of where it is in the world and which way it is
//! facing. Heading comes from the tilt-compensated magnetometer, position from the GPS receiver,
//! and every valid fix is recorded in the position/heading trace.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod gps;
pub mod heading;
pub mod trace;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use gps::{FixMode, GpsFix};
pub use heading::{compute_heading, HeadingError, HeadingReading};
pub use trace::{Estimate, Estimator, EstimatorError, Trace, TrackLog, TrackPoint};
