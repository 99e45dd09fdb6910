//! # Message bus module
//!
//! Every message on the bus is a single frame of the form `"<topic> <payload>"`. Subscribers
//! filter on the topic prefix, so the topic must never contain a space.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::fmt;

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Topics the coordinator subscribes to.
pub const SUBSCRIBED_TOPICS: [Topic; 5] = [
    Topic::Detections,
    Topic::Camera,
    Topic::Moisture,
    Topic::Imu,
    Topic::Gps,
];

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// All topics known to the system.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Topic {
    /// Drive/steer demands to the locomotion actuator, `"<drive> <steer>"`.
    Control,

    /// Rail position demands.
    Rail,

    /// Onboard pump on/off.
    Pump,

    /// Remote zone pumps, `"<zone> <0|1>"`.
    RemotePump,

    /// Detections from the external vision pipeline.
    Detections,

    /// Base64 encoded camera frames.
    Camera,

    /// Soil moisture telemetry from the field sensors.
    Moisture,

    /// Accelerometer and magnetometer samples.
    Imu,

    /// GPS receiver reports.
    Gps,
}

/// Errors that can occur when parsing a bus frame.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BusFrameError {
    #[error("The frame is not valid UTF-8")]
    NonUtf8,

    #[error("The frame has no payload separator")]
    MissingSeparator,

    #[error("Unknown topic \"{0}\"")]
    UnknownTopic(String),
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A message on the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct BusMsg {
    pub topic: Topic,
    pub payload: String,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Topic {
    /// The topic string used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Control => "robot/control",
            Topic::Rail => "robot/rail",
            Topic::Pump => "robot/pump",
            Topic::RemotePump => "robot/remotepump",
            Topic::Detections => "robot/detections",
            Topic::Camera => "robot/camera",
            Topic::Moisture => "moisture/data",
            Topic::Imu => "imu/data",
            Topic::Gps => "gps/data",
        }
    }

    /// Parse a wire topic string.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "robot/control" => Some(Topic::Control),
            "robot/rail" => Some(Topic::Rail),
            "robot/pump" => Some(Topic::Pump),
            "robot/remotepump" => Some(Topic::RemotePump),
            "robot/detections" => Some(Topic::Detections),
            "robot/camera" => Some(Topic::Camera),
            "moisture/data" => Some(Topic::Moisture),
            "imu/data" => Some(Topic::Imu),
            "gps/data" => Some(Topic::Gps),
            _ => None,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BusMsg {
    pub fn new<S: Into<String>>(topic: Topic, payload: S) -> Self {
        Self {
            topic,
            payload: payload.into(),
        }
    }

    /// Build the wire frame for this message.
    pub fn to_frame(&self) -> String {
        format!("{} {}", self.topic.as_str(), self.payload)
    }

    /// Parse a wire frame into a message.
    pub fn from_frame(frame: &[u8]) -> Result<Self, BusFrameError> {
        let s = std::str::from_utf8(frame).map_err(|_| BusFrameError::NonUtf8)?;

        let mut parts = s.splitn(2, ' ');

        let topic_str = parts.next().unwrap_or("");
        let payload = parts.next().ok_or(BusFrameError::MissingSeparator)?;

        let topic = Topic::from_wire(topic_str)
            .ok_or_else(|| BusFrameError::UnknownTopic(topic_str.to_string()))?;

        Ok(Self::new(topic, payload))
    }
}
