use std::process::{Command, Stdio};

use timelapse_common::frame::Frame;
use tracing::{debug, warn};

use super::{CameraDriver, CameraError, CaptureOptions, CaptureProperty};

/// Camera driver that grabs a single still through `ffmpeg`.
///
/// ffmpeg opens the device, reads one frame and exits, so the device is only
/// held while the subprocess runs. The still is piped back as PNG and decoded
/// with the `image` crate.
///
/// The subprocess is waited on with `std::process` rather than
/// `tokio::process`: [`CameraDriver`] is synchronous and the capture loop
/// does nothing else while a still is being grabbed.
pub struct FfmpegDriver {
    ffmpeg_path: String,
    opened: Option<OpenDevice>,
}

struct OpenDevice {
    url: String,
    input_format: String,
    width: Option<u32>,
    height: Option<u32>,
}

impl FfmpegDriver {
    pub fn new(ffmpeg_path: &str) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.to_string(),
            opened: None,
        }
    }

    fn args(device: &OpenDevice) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-f"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.push(device.input_format.clone());
        if let (Some(w), Some(h)) = (device.width, device.height) {
            args.push("-video_size".into());
            args.push(format!("{w}x{h}"));
        }
        args.push("-i".into());
        args.push(device.url.clone());
        args.extend(
            ["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "pipe:1"]
                .iter()
                .map(|s| s.to_string()),
        );
        args
    }
}

/// Resolve the configured device into something ffmpeg can open. A bare
/// integer under v4l2 is a `/dev/videoN` index.
pub fn device_url(device: &str, input_format: &str) -> String {
    match (input_format, device.trim().parse::<u32>()) {
        ("v4l2", Ok(n)) => format!("/dev/video{n}"),
        _ => device.trim().to_string(),
    }
}

impl CameraDriver for FfmpegDriver {
    fn open(&mut self, device: &str, options: &CaptureOptions) -> Result<(), CameraError> {
        let url = device_url(device, &options.input_format);
        debug!(url, input_format = options.input_format, "ffmpeg device opened");
        self.opened = Some(OpenDevice {
            url,
            input_format: options.input_format.clone(),
            width: None,
            height: None,
        });
        Ok(())
    }

    fn set(&mut self, property: CaptureProperty, value: u32) -> Result<(), CameraError> {
        let device = self.opened.as_mut().ok_or(CameraError::NotOpen)?;
        match property {
            CaptureProperty::FrameWidth => device.width = Some(value),
            CaptureProperty::FrameHeight => device.height = Some(value),
        }
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Frame>, CameraError> {
        let device = self.opened.as_ref().ok_or(CameraError::NotOpen)?;

        let output = Command::new(&self.ffmpeg_path)
            .args(Self::args(device))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| CameraError::Spawn(self.ffmpeg_path.clone(), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(url = device.url, stderr = %stderr.trim(), "ffmpeg capture failed");
            return Ok(None);
        }
        if output.stdout.is_empty() {
            return Ok(None);
        }

        match image::load_from_memory(&output.stdout) {
            Ok(img) => {
                debug!(
                    width = img.width(),
                    height = img.height(),
                    bytes = output.stdout.len(),
                    "ffmpeg still decoded"
                );
                Ok(Some(Frame::now(img)))
            }
            Err(e) => {
                warn!(error = %e, "failed to decode ffmpeg still");
                Ok(None)
            }
        }
    }

    fn release(&mut self) -> Result<(), CameraError> {
        self.opened = None;
        Ok(())
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Check whether ffmpeg is runnable. Logs a warning if not found.
pub fn check_ffmpeg_available(ffmpeg_path: &str) {
    match Command::new(ffmpeg_path)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) if status.success() => {
            debug!(ffmpeg_path, "ffmpeg is available");
        }
        Ok(_) => {
            warn!(ffmpeg_path, "ffmpeg returned non-zero for -version; capture may fail");
        }
        Err(e) => {
            warn!(
                ffmpeg_path,
                error = %e,
                "ffmpeg not found; captures will fail. Install ffmpeg or set camera.ffmpeg_path."
            );
        }
    }
}
