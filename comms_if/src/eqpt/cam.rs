//! # Camera Equipment Communications Module
//!
//! Camera frames arrive on `robot/camera` as `{"image": "<base64 encoded JPEG/PNG>"}`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Camera message as sent on the bus.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamMsg {
    #[serde(default)]
    pub image: String,
}

/// A decoded camera frame.
#[derive(Clone)]
pub struct CamImage {
    /// UTC timestamp at which the frame was received
    pub timestamp: DateTime<Utc>,

    /// The image itself
    pub image: DynamicImage,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CamDecodeError {
    #[error("Camera message is not valid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("No image data found in camera message")]
    NoImageData,

    #[error("Image data is not valid base64: {0}")]
    Base64Error(base64::DecodeError),

    #[error("Could not decode the image: {0}")]
    ImageError(image::ImageError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CamMsg {
    pub fn from_json(json_str: &str) -> Result<Self, CamDecodeError> {
        serde_json::from_str(json_str).map_err(CamDecodeError::InvalidJson)
    }

    /// Build a message from an encoded image (for example JPEG bytes).
    pub fn from_encoded(data: &[u8]) -> Self {
        Self {
            image: base64::encode(data),
        }
    }

    /// Decode the frame held in this message.
    pub fn decode(&self) -> Result<CamImage, CamDecodeError> {
        if self.image.is_empty() {
            return Err(CamDecodeError::NoImageData);
        }

        let bytes = base64::decode(&self.image).map_err(CamDecodeError::Base64Error)?;
        let image = image::load_from_memory(&bytes).map_err(CamDecodeError::ImageError)?;

        Ok(CamImage {
            timestamp: Utc::now(),
            image,
        })
    }
}

impl CamImage {
    /// A black frame of the given size, used before the first frame arrives.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            timestamp: Utc::now(),
            image: DynamicImage::new_rgb8(width, height),
        }
    }
}

impl std::fmt::Debug for CamImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use image::GenericImageView;

        f.debug_struct("CamImage")
            .field("timestamp", &self.timestamp)
            .field("dimensions", &self.image.dimensions())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use image::GenericImageView;

    #[test]
    fn test_decode_png() {
        let mut png = Vec::new();
        DynamicImage::new_rgb8(4, 3)
            .write_to(&mut png, image::ImageOutputFormat::Png)
            .unwrap();

        let msg = CamMsg::from_json(&format!(r#"{{"image": "{}"}}"#, base64::encode(&png))).unwrap();
        let frame = msg.decode().unwrap();

        assert_eq!(frame.image.dimensions(), (4, 3));
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            CamMsg::from_json("{}").unwrap().decode(),
            Err(CamDecodeError::NoImageData)
        ));
        assert!(matches!(
            CamMsg { image: "***".into() }.decode(),
            Err(CamDecodeError::Base64Error(_))
        ));
        assert!(matches!(
            CamMsg::from_encoded(b"not an image").decode(),
            Err(CamDecodeError::ImageError(_))
        ));
    }
}
