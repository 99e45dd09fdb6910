//! # Operating modes

use std::{fmt, str::FromStr};

use serde::Serialize;

/// The operating mode of the robot. Exactly one is active at a time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Mode {
    /// Only explicit movement telecommands move the robot.
    Manual,

    /// The robot follows the detected target.
    Tracking,

    /// The navigation worker drives the robot through the waypoints.
    AutoNavigate,
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("Unknown mode \"{0}\"")]
pub struct UnknownModeError(pub String);

impl Mode {
    /// The name used by the control surface.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Mode::Manual => "basic_movement",
            Mode::Tracking => "face_tracking",
            Mode::AutoNavigate => "auto_navigation",
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Manual
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for Mode {
    type Err = UnknownModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic_movement" | "manual" => Ok(Mode::Manual),
            "face_tracking" | "tracking" => Ok(Mode::Tracking),
            "auto_navigation" | "auto_navigate" => Ok(Mode::AutoNavigate),
            _ => Err(UnknownModeError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("face_tracking".parse(), Ok(Mode::Tracking));
        assert_eq!("auto_navigate".parse(), Ok(Mode::AutoNavigate));
        assert_eq!("basic_movement".parse(), Ok(Mode::Manual));
        assert!("Tracking".parse::<Mode>().is_err());
        assert!("".parse::<Mode>().is_err());

        assert_eq!(Mode::AutoNavigate.to_string(), "auto_navigation");
    }
}
