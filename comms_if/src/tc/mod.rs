//! # Telecommand module
//!
//! This module provides telecommand functionality to the communications interface. Telecommands
//! are sent by the control surface (the operator dashboard) to the coordinator as JSON objects of
//! the form `{"type": "<TYPE>", "payload": {...}}`, and every telecommand is answered with a
//! [`TcResponse`].

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Response code for an accepted telecommand.
pub const CODE_OK: u16 = 200;

/// Response code for a rejected telecommand.
pub const CODE_REJECTED: u16 = 400;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A navigation waypoint as submitted by the control surface.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub lat: f64,
    pub lng: f64,
}

/// The response to a telecommand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcResponse {
    /// HTTP-like status code, 200 on success.
    pub code: u16,

    /// Either `{"status": "<message>"}` or the polled data.
    pub body: Value,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A telecommand, i.e. an instruction sent to the coordinator by the control surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tc {
    /// Activate the safety override.
    EStop,

    /// Clear the safety override.
    UndoEStop,

    MoveForward,
    MoveBackward,
    MoveLeft,
    MoveRight,
    StopRobot,

    MoveRailForward,
    MoveRailBackward,
    StopRail,

    PumpOn,
    PumpOff,

    IncreaseFaceArea,
    DecreaseFaceArea,
    MoveCenterLeft,
    MoveCenterRight,

    /// Replace the tracking gains, shared by both tracking axes.
    UpdatePid {
        kp: Option<f64>,
        ki: Option<f64>,
        kd: Option<f64>,
    },

    /// Request a mode change.
    SetMode { mode: String },

    /// Submit a waypoint list for autonomous navigation.
    SendCoordinates {
        #[serde(default)]
        coordinates: Vec<Waypoint>,
    },

    /// Poll the whole position/heading trace.
    GetTrace,

    /// Poll the most recent valid fix.
    LatestFix,
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {
    /// Parse a telecommand from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        serde_json::from_str(json_str).map_err(TcParseError::InvalidJson)
    }

    /// Serialize the telecommand into a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl TcResponse {
    /// An accepted telecommand with a status message.
    pub fn ok<S: AsRef<str>>(status: S) -> Self {
        Self::data(CODE_OK, json!({ "status": status.as_ref() }))
    }

    /// A rejected telecommand with a status message.
    pub fn rejected<S: AsRef<str>>(status: S) -> Self {
        Self::data(CODE_REJECTED, json!({ "status": status.as_ref() }))
    }

    /// A response carrying data.
    pub fn data(code: u16, body: Value) -> Self {
        Self { code, body }
    }

    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }

    /// The status message, if the body has one.
    pub fn status(&self) -> Option<&str> {
        self.body.get("status").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_unit_tcs() {
        assert_eq!(Tc::from_json(r#"{"type": "E_STOP"}"#).unwrap(), Tc::EStop);
        assert_eq!(
            Tc::from_json(r#"{"type": "UNDO_E_STOP"}"#).unwrap(),
            Tc::UndoEStop
        );
        assert_eq!(
            Tc::from_json(r#"{"type": "MOVE_RAIL_FORWARD"}"#).unwrap(),
            Tc::MoveRailForward
        );
        assert!(Tc::from_json(r#"{"type": "SELF_DESTRUCT"}"#).is_err());
    }

    #[test]
    fn test_parse_payload_tcs() {
        assert_eq!(
            Tc::from_json(r#"{"type": "SET_MODE", "payload": {"mode": "face_tracking"}}"#).unwrap(),
            Tc::SetMode {
                mode: "face_tracking".into()
            }
        );

        assert_eq!(
            Tc::from_json(r#"{"type": "UPDATE_PID", "payload": {"kp": 1.0, "ki": 0.5}}"#).unwrap(),
            Tc::UpdatePid {
                kp: Some(1.0),
                ki: Some(0.5),
                kd: None
            }
        );

        assert_eq!(
            Tc::from_json(
                r#"{"type": "SEND_COORDINATES", "payload": {"coordinates": [{"lat": 1.5, "lng": -2.0}]}}"#
            )
            .unwrap(),
            Tc::SendCoordinates {
                coordinates: vec![Waypoint { lat: 1.5, lng: -2.0 }]
            }
        );

        assert_eq!(
            Tc::from_json(r#"{"type": "SEND_COORDINATES", "payload": {}}"#).unwrap(),
            Tc::SendCoordinates {
                coordinates: vec![]
            }
        );
    }

    #[test]
    fn test_response() {
        let r = TcResponse::rejected("Invalid mode selected");
        assert!(!r.is_ok());
        assert_eq!(r.code, 400);
        assert_eq!(r.status(), Some("Invalid mode selected"));

        assert!(TcResponse::ok("E-Stop activated").is_ok());
    }
}
