mod camera;
mod orchestrator;
mod similarity;
mod storage;
mod tracker;

#[cfg(test)]
mod testing;

use camera::ffmpeg::{check_ffmpeg_available, FfmpegDriver};
use camera::{SessionError, SessionSettings};
use orchestrator::Orchestrator;
use similarity::{SimilarityError, SimilarityGate};
use std::path::PathBuf;
use storage::{ShotStore, StoreError};
use timelapse_common::config::{Config, ConfigError};
use tracker::MonotonicClock;
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("capture session error: {0}")]
    Session(#[from] SessionError),
    #[error("similarity error: {0}")]
    Similarity(#[from] SimilarityError),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        device = config.camera.device,
        input_format = config.camera.input_format,
        width = config.camera.width,
        height = config.camera.height,
        interval_secs = config.capture.interval_secs,
        storage = %config.storage.path.display(),
        prefix = config.storage.prefix,
        algorithm = %config.similarity.algorithm,
        threshold = config.similarity.threshold,
        "starting timelapse capture"
    );

    if let Err(e) = run(&config).await {
        error!(error = %e, "timelapse capture aborted");
        std::process::exit(1);
    }
}

async fn run(config: &Config) -> Result<(), CaptureError> {
    let store = ShotStore::from_config(&config.storage);
    store.ensure_writable()?;

    check_ffmpeg_available(&config.camera.ffmpeg_path);

    let backend = similarity::backend_from_config(&config.similarity);
    let mut orchestrator = Orchestrator::new(
        FfmpegDriver::new(&config.camera.ffmpeg_path),
        SessionSettings::from_config(&config.camera, &config.capture),
        store,
        SimilarityGate::new(backend, config.similarity.threshold),
        MonotonicClock,
        config.capture.poll_interval(),
    );

    let finished = tokio::select! {
        result = orchestrator.run() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    match finished {
        Some(result) => {
            result?;
            info!(
                captures = orchestrator.captures(),
                last_index = orchestrator.store().index(),
                "user has left the scene, timelapse complete"
            );
        }
        None => {
            info!(
                captures = orchestrator.captures(),
                "interrupted, stopping between captures"
            );
        }
    }
    Ok(())
}
