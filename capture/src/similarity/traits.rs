use image::GrayImage;

/// Pixel-level similarity between two equally shaped luma images.
///
/// Implementations must be pure in their inputs. Higher scores mean more
/// similar; 1.0 is identical.
pub trait Similarity {
    fn compare(&self, a: &GrayImage, b: &GrayImage) -> Result<f64, SimilarityError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

impl<S: Similarity + ?Sized> Similarity for Box<S> {
    fn compare(&self, a: &GrayImage, b: &GrayImage) -> Result<f64, SimilarityError> {
        (**self).compare(a, b)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SimilarityError {
    #[error("image dimensions differ: {a:?} vs {b:?}")]
    DimensionMismatch { a: (u32, u32), b: (u32, u32) },
    #[error("similarity computation failed: {0}")]
    Compare(String),
}

/// Shared shape check so every backend fails the same way.
pub(crate) fn ensure_same_shape(a: &GrayImage, b: &GrayImage) -> Result<(), SimilarityError> {
    if a.dimensions() != b.dimensions() {
        return Err(SimilarityError::DimensionMismatch {
            a: a.dimensions(),
            b: b.dimensions(),
        });
    }
    Ok(())
}
