//! # Position/heading trace
//!
//! Every valid fix appends a [`TrackPoint`] to the trace. Points are never changed once appended,
//! and the trace is read concurrently by the telecommand pollers, so it lives behind a mutex that
//! writers hold only for the push.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use util::maths::{get_ang_dist_deg, norm_deg_360};

use super::GpsFix;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Shared handle to the trace.
pub type TrackLog = Arc<Mutex<Vec<TrackPoint>>>;

/// A smoothed estimate of the robot's position and heading.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Estimate {
    pub lat: f64,
    pub lon: f64,

    /// `None` until the first valid heading has been seen.
    pub heading_deg: Option<f64>,
}

/// A single point in the trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackPoint {
    pub timestamp: DateTime<Utc>,

    /// Raw latitude from the receiver
    pub lat: f64,

    /// Raw longitude from the receiver
    pub lon: f64,

    /// Raw heading for the cycle, `None` if the heading was not available
    pub heading_deg: Option<f64>,

    pub estimate: Option<Estimate>,
}

/// Exponential smoothing of the raw fixes and headings.
#[derive(Debug, Clone)]
pub struct Estimator {
    alpha: f64,
    estimate: Option<Estimate>,
}

/// The trace and the estimator that feeds it.
#[derive(Debug)]
pub struct Trace {
    log: TrackLog,
    estimator: Estimator,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EstimatorError {
    #[error("The smoothing factor must be in (0, 1], found {0}")]
    InvalidAlpha(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Estimator {
    /// Create a new estimator. An `alpha` of 1 disables smoothing.
    pub fn new(alpha: f64) -> Result<Self, EstimatorError> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(EstimatorError::InvalidAlpha(alpha));
        }

        Ok(Self {
            alpha,
            estimate: None,
        })
    }

    /// Fold a new fix and heading into the estimate and return it.
    pub fn update(&mut self, fix: &GpsFix, heading_deg: Option<f64>) -> Estimate {
        let a = self.alpha;

        let est = match self.estimate {
            None => Estimate {
                lat: fix.lat,
                lon: fix.lon,
                heading_deg,
            },
            Some(prev) => Estimate {
                lat: prev.lat + a * (fix.lat - prev.lat),
                lon: prev.lon + a * (fix.lon - prev.lon),
                heading_deg: match (prev.heading_deg, heading_deg) {
                    (Some(p), Some(h)) => Some(norm_deg_360(p + a * get_ang_dist_deg(p, h))),
                    (None, h) => h,
                    (p, None) => p,
                },
            },
        };

        self.estimate = Some(est);
        est
    }

    pub fn estimate(&self) -> Option<Estimate> {
        self.estimate
    }
}

impl Trace {
    pub fn new(estimator: Estimator) -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            estimator,
        }
    }

    /// Get a handle to the trace for readers.
    pub fn handle(&self) -> TrackLog {
        self.log.clone()
    }

    /// Record a fix taken at `timestamp`, returning the appended point.
    pub fn append(
        &mut self,
        timestamp: DateTime<Utc>,
        fix: &GpsFix,
        heading_deg: Option<f64>,
    ) -> TrackPoint {
        let estimate = self.estimator.update(fix, heading_deg);

        let point = TrackPoint {
            timestamp,
            lat: fix.lat,
            lon: fix.lon,
            heading_deg,
            estimate: Some(estimate),
        };

        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(point.clone());

        point
    }

    /// Number of points in the trace.
    pub fn len(&self) -> usize {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The most recent point, if any fix has been recorded.
    pub fn latest(&self) -> Option<TrackPoint> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}
