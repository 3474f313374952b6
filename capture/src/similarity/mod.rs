pub mod histogram;
pub mod ssim;
pub mod traits;

use image::GrayImage;
use timelapse_common::config::{SimilarityAlgorithm, SimilarityConfig};
use timelapse_common::frame::Frame;
use tracing::debug;

pub use histogram::HistogramSimilarity;
pub use ssim::SsimSimilarity;
pub use traits::{Similarity, SimilarityError};

/// Outcome of one comparison. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub score: f64,
    pub should_stop: bool,
}

impl Decision {
    pub fn percent(&self) -> i64 {
        (self.score * 100.0).round() as i64
    }
}

/// Luma conversion applied to both sides before scoring.
pub fn grayscale(frame: &Frame) -> GrayImage {
    frame.to_gray()
}

/// The scene is considered vacated once the score is strictly above the
/// threshold.
pub fn should_stop(score: f64, threshold: f64) -> bool {
    score > threshold
}

/// Pairs a similarity backend with the stop threshold.
pub struct SimilarityGate<S: Similarity> {
    similarity: S,
    threshold: f64,
}

impl<S: Similarity> SimilarityGate<S> {
    pub fn new(similarity: S, threshold: f64) -> Self {
        Self {
            similarity,
            threshold,
        }
    }

    #[cfg(test)]
    pub fn backend(&self) -> &S {
        &self.similarity
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn score(&self, current: &GrayImage, previous: &GrayImage) -> Result<f64, SimilarityError> {
        self.similarity.compare(current, previous)
    }

    pub fn evaluate(&self, current: &Frame, previous: &Frame) -> Result<Decision, SimilarityError> {
        let score = self.score(&grayscale(current), &grayscale(previous))?;
        let decision = Decision {
            score,
            should_stop: should_stop(score, self.threshold),
        };
        debug!(
            backend = self.similarity.name(),
            score = format!("{:.4}", score),
            threshold = format!("{:.4}", self.threshold),
            should_stop = decision.should_stop,
            "similarity comparison"
        );
        Ok(decision)
    }
}

/// Build the backend named in the config.
pub fn backend_from_config(config: &SimilarityConfig) -> Box<dyn Similarity> {
    match config.algorithm {
        SimilarityAlgorithm::Ssim => Box::new(SsimSimilarity),
        SimilarityAlgorithm::Histogram => Box::new(HistogramSimilarity),
    }
}
