//! # Detection Messages
//!
//! Detections are produced by the external vision pipeline and published on `robot/detections`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single detected target.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Centre of the target in image pixel coordinates, `[x, y]`.
    pub center: [f64; 2],

    /// Area of the target in pixels.
    pub area: f64,
}

/// A detection message, which may hold any number of detections.
///
/// An empty list (or a missing `detections` key) means the target has been lost.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionMsg {
    #[serde(default)]
    pub detections: Vec<Detection>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DetectionMsg {
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    /// The detection used for control, which is always the first one.
    pub fn primary(&self) -> Option<Detection> {
        self.detections.first().copied()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse() {
        let msg = DetectionMsg::from_json(
            r#"{"detections": [{"center": [420, 240], "area": 4000}, {"center": [1, 2], "area": 3}]}"#,
        )
        .unwrap();

        assert_eq!(
            msg.primary(),
            Some(Detection {
                center: [420.0, 240.0],
                area: 4000.0
            })
        );

        assert_eq!(DetectionMsg::from_json("{}").unwrap().primary(), None);
        assert!(DetectionMsg::from_json(r#"{"detections": 5}"#).is_err());
    }
}
