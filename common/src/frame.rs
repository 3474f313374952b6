use image::{DynamicImage, GrayImage};
use std::path::Path;

/// A single still captured from the camera, with its capture time.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: DynamicImage,
    /// Unix millis.
    pub captured_at_ms: i64,
}

impl Frame {
    pub fn new(image: DynamicImage, captured_at_ms: i64) -> Self {
        Self {
            image,
            captured_at_ms,
        }
    }

    /// Wrap an image captured right now.
    pub fn now(image: DynamicImage) -> Self {
        Self::new(image, chrono::Utc::now().timestamp_millis())
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Returns true for a blank read: no pixels at all, or every sample zero.
    /// Drivers hand these back when the sensor has not produced data yet.
    pub fn is_empty(&self) -> bool {
        if self.width() == 0 || self.height() == 0 {
            return true;
        }
        self.image.as_bytes().iter().all(|&b| b == 0)
    }

    /// Single-channel luma copy, the input every similarity backend expects.
    pub fn to_gray(&self) -> GrayImage {
        self.image.to_luma8()
    }

    // -- Codec ------------------------------------------------------------------

    /// Encode to disk. The format follows the path's extension.
    pub fn save(&self, path: &Path) -> Result<(), FrameError> {
        // JPEG has no alpha channel, so always hand the encoder plain RGB.
        self.image
            .to_rgb8()
            .save(path)
            .map_err(|e| FrameError::Encode(path.display().to_string(), e))?;
        tracing::debug!(path = %path.display(), "frame written");
        Ok(())
    }

    /// Decode a previously stored frame. The capture time is taken from the
    /// file's modification time.
    pub fn open(path: &Path) -> Result<Self, FrameError> {
        let image =
            image::open(path).map_err(|e| FrameError::Decode(path.display().to_string(), e))?;
        let captured_at_ms = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).timestamp_millis())
            .unwrap_or_else(|_| chrono::Utc::now().timestamp_millis());
        Ok(Self::new(image, captured_at_ms))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("failed to encode frame to {0}: {1}")]
    Encode(String, image::ImageError),
    #[error("failed to decode frame from {0}: {1}")]
    Decode(String, image::ImageError),
}
