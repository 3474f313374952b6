use std::time::Duration;

use timelapse_common::config::{CameraConfig, CaptureConfig};
use timelapse_common::frame::Frame;
use tracing::{debug, warn};

use super::{CameraDriver, CameraError, CaptureOptions, CaptureProperty};

/// Everything a capture session needs to know about the device.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub device: String,
    pub options: CaptureOptions,
    pub width: u32,
    pub height: u32,
    /// Capture cadence hint, carried for logging.
    pub interval: Duration,
}

impl SessionSettings {
    pub fn from_config(camera: &CameraConfig, capture: &CaptureConfig) -> Self {
        Self {
            device: camera.device.clone(),
            options: CaptureOptions::new(&camera.input_format),
            width: camera.width,
            height: camera.height,
            interval: capture.interval(),
        }
    }
}

/// One open/read/release cycle against the camera driver.
///
/// The session borrows the driver for its own lifetime only; the device is
/// never held open across orchestrator ticks.
pub struct CaptureSession<'a, D: CameraDriver + ?Sized> {
    driver: &'a mut D,
    settings: &'a SessionSettings,
}

impl<'a, D: CameraDriver + ?Sized> CaptureSession<'a, D> {
    /// Fails fast when a mandatory parameter is missing.
    pub fn new(driver: &'a mut D, settings: &'a SessionSettings) -> Result<Self, SessionError> {
        if settings.device.trim().is_empty() {
            return Err(SessionError::Missing("device"));
        }
        if settings.interval.is_zero() {
            return Err(SessionError::Missing("interval"));
        }
        if settings.options.is_empty() {
            return Err(SessionError::Missing("capture options"));
        }
        Ok(Self { driver, settings })
    }

    /// Open the device, apply the resolution, read exactly one frame and
    /// release the device. Returns `Ok(None)` for a blank or empty read.
    pub fn capture_frame(mut self) -> Result<Option<Frame>, SessionError> {
        let settings = self.settings;
        debug!(
            driver = self.driver.name(),
            device = settings.device,
            width = settings.width,
            height = settings.height,
            interval_secs = settings.interval.as_secs(),
            "opening capture session"
        );

        self.driver.open(&settings.device, &settings.options)?;
        let read = self.read_one();
        // Release even when the read failed; the next tick reopens.
        let released = self.driver.release();

        let frame = read?;
        released?;

        match frame {
            Some(f) if !f.is_empty() => Ok(Some(f)),
            Some(_) => {
                warn!(device = settings.device, "camera returned an empty frame");
                Ok(None)
            }
            None => {
                warn!(device = settings.device, "camera returned no frame");
                Ok(None)
            }
        }
    }

    fn read_one(&mut self) -> Result<Option<Frame>, CameraError> {
        self.driver
            .set(CaptureProperty::FrameWidth, self.settings.width)?;
        self.driver
            .set(CaptureProperty::FrameHeight, self.settings.height)?;
        self.driver.read()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("missing mandatory capture parameter: {0}")]
    Missing(&'static str),
    #[error(transparent)]
    Camera(#[from] CameraError),
}
