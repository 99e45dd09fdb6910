//! # PID controller
//!
//! A discrete proportional-integral-derivative controller with anti-windup and output clamping.
//!
//! The controller is stepped once per control cycle and is not time-aware: the integral is the
//! plain sum of errors and the derivative is the difference from the previous error. It must
//! therefore be updated at a roughly constant cadence.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use util::maths::clamp_sym;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default symmetric bound on the accumulated integral.
pub const DEFAULT_INTEGRAL_BOUND: f64 = 10_000.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A gain triple.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    pub k_i: f64,

    /// Derivative gain
    pub k_d: f64,
}

/// Construction parameters for a controller.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PidParams {
    #[serde(flatten)]
    pub gains: PidGains,

    /// Symmetric bound on the controller output.
    pub max_output: f64,

    /// Symmetric bound on the accumulated integral.
    #[serde(default = "default_integral_bound")]
    pub integral_bound: f64,
}

/// A PID controller
#[derive(Debug, Clone, Serialize)]
pub struct PidController {
    gains: PidGains,

    max_output: f64,

    integral_bound: f64,

    /// The integral accumulation
    integral: f64,

    /// Previous error
    prev_error: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PidError {
    #[error("PID gains must be finite, found {0:?}")]
    InvalidGains(PidGains),

    #[error("The {0} bound must be finite and positive, found {1}")]
    InvalidBound(&'static str, f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidGains {
    pub fn new(k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self { k_p, k_i, k_d }
    }

    fn validate(&self) -> Result<(), PidError> {
        if self.k_p.is_finite() && self.k_i.is_finite() && self.k_d.is_finite() {
            Ok(())
        } else {
            Err(PidError::InvalidGains(*self))
        }
    }
}

impl PidParams {
    pub fn new(gains: PidGains, max_output: f64) -> Self {
        Self {
            gains,
            max_output,
            integral_bound: DEFAULT_INTEGRAL_BOUND,
        }
    }
}

impl PidController {
    /// Create a new controller, rejecting non-finite gains and non-positive bounds.
    pub fn new(params: PidParams) -> Result<Self, PidError> {
        params.gains.validate()?;
        check_bound("output", params.max_output)?;
        check_bound("integral", params.integral_bound)?;

        Ok(Self {
            gains: params.gains,
            max_output: params.max_output,
            integral_bound: params.integral_bound,
            integral: 0.0,
            prev_error: 0.0,
        })
    }

    /// Step the controller with the current error and return the clamped output.
    pub fn update(&mut self, error: f64) -> f64 {
        self.integral = clamp_sym(self.integral + error, self.integral_bound);

        let deriv = error - self.prev_error;
        self.prev_error = error;

        let out = self.gains.k_p * error + self.gains.k_i * self.integral + self.gains.k_d * deriv;

        clamp_sym(out, self.max_output)
    }

    /// Replace the gains, keeping the accumulated state.
    pub fn set_gains(&mut self, gains: PidGains) -> Result<(), PidError> {
        gains.validate()?;
        self.gains = gains;
        Ok(())
    }

    /// Clear the integral and previous error.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn max_output(&self) -> f64 {
        self.max_output
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn prev_error(&self) -> f64 {
        self.prev_error
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn default_integral_bound() -> f64 {
    DEFAULT_INTEGRAL_BOUND
}

fn check_bound(name: &'static str, bound: f64) -> Result<(), PidError> {
    if bound.is_finite() && bound > 0.0 {
        Ok(())
    } else {
        Err(PidError::InvalidBound(name, bound))
    }
}
