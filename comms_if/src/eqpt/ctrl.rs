//! # Locomotion Actuator Commands
//!
//! The locomotion actuator understands a single vocabulary: a pair of integers in `[0, 126]`,
//! one for the drive axis and one for the steer axis, where 64 is neutral on both.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Serialize;
use std::{fmt, str::FromStr};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Lowest actuator value.
pub const ACT_MIN: u8 = 0;

/// Neutral (stop) actuator value.
pub const ACT_NEUTRAL: u8 = 64;

/// Highest actuator value.
pub const ACT_MAX: u8 = 126;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A demand to the locomotion actuator.
///
/// The fields are private so that a command outside the actuator range can never be built.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ControlCommand {
    drive: u8,
    steer: u8,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ControlCommandError {
    #[error("Actuator value {0} is outside of [0, 126]")]
    OutOfRange(i64),

    #[error("Expected \"<drive> <steer>\", found \"{0}\"")]
    Malformed(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ControlCommand {
    /// Stop on both axes.
    pub const NEUTRAL: ControlCommand = ControlCommand {
        drive: ACT_NEUTRAL,
        steer: ACT_NEUTRAL,
    };

    /// Manual full speed forward.
    pub const FORWARD: ControlCommand = ControlCommand {
        drive: ACT_MAX,
        steer: ACT_NEUTRAL,
    };

    /// Manual full speed backward.
    pub const BACKWARD: ControlCommand = ControlCommand {
        drive: ACT_MIN,
        steer: ACT_NEUTRAL,
    };

    /// Manual turn left on the spot.
    pub const LEFT: ControlCommand = ControlCommand {
        drive: ACT_NEUTRAL,
        steer: ACT_MAX,
    };

    /// Manual turn right on the spot.
    pub const RIGHT: ControlCommand = ControlCommand {
        drive: ACT_NEUTRAL,
        steer: ACT_MIN,
    };

    /// Create a new command, checking both values are in range.
    pub fn new(drive: i64, steer: i64) -> Result<Self, ControlCommandError> {
        Ok(Self {
            drive: check_range(drive)?,
            steer: check_range(steer)?,
        })
    }

    /// Create a new command, saturating both values into the actuator range.
    pub fn saturating(drive: i64, steer: i64) -> Self {
        Self {
            drive: drive.clamp(ACT_MIN as i64, ACT_MAX as i64) as u8,
            steer: steer.clamp(ACT_MIN as i64, ACT_MAX as i64) as u8,
        }
    }

    pub fn drive(&self) -> u8 {
        self.drive
    }

    pub fn steer(&self) -> u8 {
        self.steer
    }

    pub fn is_neutral(&self) -> bool {
        *self == Self::NEUTRAL
    }
}

impl Default for ControlCommand {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.drive, self.steer)
    }
}

impl FromStr for ControlCommand {
    type Err = ControlCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ControlCommandError::Malformed(s.to_string());

        let mut parts = s.split_whitespace();
        let drive: i64 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(malformed)?;
        let steer: i64 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(malformed)?;

        if parts.next().is_some() {
            return Err(malformed());
        }

        Self::new(drive, steer)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn check_range(value: i64) -> Result<u8, ControlCommandError> {
    if value < ACT_MIN as i64 || value > ACT_MAX as i64 {
        Err(ControlCommandError::OutOfRange(value))
    } else {
        Ok(value as u8)
    }
}
