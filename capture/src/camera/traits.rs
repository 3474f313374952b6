use timelapse_common::frame::Frame;

/// Driver property the session configures before reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureProperty {
    FrameWidth,
    FrameHeight,
}

/// Backend options passed when opening the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Input format understood by the driver (`v4l2`, `dshow`, ...).
    pub input_format: String,
}

impl CaptureOptions {
    pub fn new(input_format: &str) -> Self {
        Self {
            input_format: input_format.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.input_format.trim().is_empty()
    }
}

/// The camera collaborator. Implementations own the device handle; a
/// [`super::CaptureSession`] drives one open/read/release cycle per capture.
pub trait CameraDriver {
    fn open(&mut self, device: &str, options: &CaptureOptions) -> Result<(), CameraError>;

    fn set(&mut self, property: CaptureProperty, value: u32) -> Result<(), CameraError>;

    /// Read one frame. `Ok(None)` is a blank read: the device answered but
    /// produced nothing usable.
    fn read(&mut self) -> Result<Option<Frame>, CameraError>;

    fn release(&mut self) -> Result<(), CameraError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("failed to spawn {0}: {1}")]
    Spawn(String, std::io::Error),
    #[error("device is not open")]
    NotOpen,
}
