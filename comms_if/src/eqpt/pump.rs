//! # Pump and Rail Commands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Demand for the spray rail actuator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RailCmd {
    Forward,
    Backward,
    Stop,
}

/// Demand for the onboard pump.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PumpCmd {
    On,
    Off,
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Demand for the pump serving one irrigation zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePumpCmd {
    pub zone: String,
    pub on: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RailCmd {
    /// Payload for the `robot/rail` topic.
    ///
    /// The rail actuator is mounted reversed, so forward is the low end of the range.
    pub fn payload(&self) -> &'static str {
        match self {
            RailCmd::Forward => "0",
            RailCmd::Backward => "126",
            RailCmd::Stop => "64",
        }
    }
}

impl PumpCmd {
    /// Payload for the `robot/pump` topic.
    pub fn payload(&self) -> &'static str {
        match self {
            PumpCmd::On => "1",
            PumpCmd::Off => "0",
        }
    }
}

impl RemotePumpCmd {
    /// Payload for the `robot/remotepump` topic.
    pub fn payload(&self) -> String {
        format!("{} {}", self.zone, if self.on { 1 } else { 0 })
    }
}
