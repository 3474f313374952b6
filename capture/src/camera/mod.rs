pub mod ffmpeg;
pub mod session;
pub mod traits;

pub use session::{CaptureSession, SessionError, SessionSettings};
pub use traits::{CameraDriver, CameraError, CaptureOptions, CaptureProperty};
