use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub camera: CameraConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub similarity: SimilarityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    /// Device identity. A bare integer `N` is shorthand for `/dev/videoN` under v4l2.
    pub device: String,
    /// ffmpeg input format (`v4l2`, `dshow`, `avfoundation`, ...).
    #[serde(default = "default_input_format")]
    pub input_format: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// The loop sleeps `interval / poll_divisor` between ticks.
    #[serde(default = "default_poll_divisor")]
    pub poll_divisor: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_extension")]
    pub extension: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimilarityConfig {
    #[serde(default)]
    pub algorithm: SimilarityAlgorithm,
    /// Scores strictly above this stop the session. 0.94 was calibrated by
    /// hand against a vacated table; tune it per scene.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityAlgorithm {
    #[default]
    Ssim,
    Histogram,
}

impl SimilarityAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ssim => "ssim",
            Self::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for SimilarityAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            poll_divisor: default_poll_divisor(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            prefix: default_prefix(),
            extension: default_extension(),
        }
    }
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            algorithm: SimilarityAlgorithm::default(),
            threshold: default_threshold(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl CaptureConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        self.interval() / self.poll_divisor.max(1)
    }
}

impl StorageConfig {
    /// Extension with a guaranteed leading dot.
    pub fn normalized_extension(&self) -> String {
        if self.extension.is_empty() || self.extension.starts_with('.') {
            self.extension.clone()
        } else {
            format!(".{}", self.extension)
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject partial configuration up front. A timelapse that silently runs
    /// with half its settings would produce nothing useful.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.device.trim().is_empty() {
            return Err(ConfigError::Missing("camera.device"));
        }
        if self.camera.input_format.trim().is_empty() {
            return Err(ConfigError::Missing("camera.input_format"));
        }
        if self.capture.interval_secs == 0 {
            return Err(ConfigError::Missing("capture.interval_secs"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "camera resolution {}x{} must be non-zero",
                self.camera.width, self.camera.height
            )));
        }
        if self.capture.poll_divisor == 0 {
            return Err(ConfigError::Invalid(
                "capture.poll_divisor must be at least 1".into(),
            ));
        }
        if self.storage.prefix.is_empty() && self.storage.extension.is_empty() {
            return Err(ConfigError::Missing("storage.prefix or storage.extension"));
        }
        if !(0.0..=1.0).contains(&self.similarity.threshold) {
            return Err(ConfigError::Invalid(format!(
                "similarity.threshold {} outside [0, 1]",
                self.similarity.threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("missing mandatory setting: {0}")]
    Missing(&'static str),
    #[error("invalid setting: {0}")]
    Invalid(String),
}

// Default value functions
fn default_input_format() -> String {
    "v4l2".into()
}
fn default_width() -> u32 {
    1920
}
fn default_height() -> u32 {
    1080
}
fn default_ffmpeg_path() -> String {
    "ffmpeg".into()
}
fn default_interval_secs() -> u64 {
    60
}
fn default_poll_divisor() -> u32 {
    5
}
fn default_storage_path() -> PathBuf {
    PathBuf::from("frames")
}
fn default_prefix() -> String {
    "shot-".into()
}
fn default_extension() -> String {
    ".jpg".into()
}
fn default_threshold() -> f64 {
    0.94
}
fn default_log_level() -> String {
    "info".into()
}
