use image::GrayImage;
use image_compare::Algorithm;

use super::traits::{ensure_same_shape, Similarity, SimilarityError};

/// Structural similarity (MSSIM) via `image-compare`.
///
/// Compares structure rather than raw intensity, so gradual lighting drift
/// over a long session still scores high while a person leaving the frame
/// does not.
#[derive(Debug, Default, Clone, Copy)]
pub struct SsimSimilarity;

impl Similarity for SsimSimilarity {
    fn compare(&self, a: &GrayImage, b: &GrayImage) -> Result<f64, SimilarityError> {
        ensure_same_shape(a, b)?;
        image_compare::gray_similarity_structure(&Algorithm::MSSIMSimple, a, b)
            .map(|similarity| similarity.score)
            .map_err(|e| SimilarityError::Compare(e.to_string()))
    }

    fn name(&self) -> &str {
        "ssim"
    }
}
