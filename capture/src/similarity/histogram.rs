use image::imageops::FilterType;
use image::GrayImage;

use super::traits::{ensure_same_shape, Similarity, SimilarityError};

const NUM_BINS: usize = 64;
const DOWNSAMPLE_SIZE: u32 = 64;

/// Histogram-based similarity.
///
/// Downsamples to 64x64, computes a normalized 64-bin intensity histogram,
/// then maps the chi-squared distance (which lies in [0, 2]) onto a [0, 1]
/// similarity. Cheaper than SSIM and blind to where pixels are, so it only
/// notices departures that change the overall tone of the scene.
#[derive(Debug, Default, Clone, Copy)]
pub struct HistogramSimilarity;

impl HistogramSimilarity {
    fn histogram(gray: &GrayImage) -> [f64; NUM_BINS] {
        let small =
            image::imageops::resize(gray, DOWNSAMPLE_SIZE, DOWNSAMPLE_SIZE, FilterType::Nearest);

        let mut bins = [0u64; NUM_BINS];
        for pixel in small.pixels() {
            let bin = (pixel.0[0] as usize * NUM_BINS) / 256;
            bins[bin.min(NUM_BINS - 1)] += 1;
        }

        let total = small.pixels().len() as f64;
        let mut hist = [0.0f64; NUM_BINS];
        for (i, &count) in bins.iter().enumerate() {
            hist[i] = count as f64 / total;
        }
        hist
    }

    /// Chi-squared distance between two normalized histograms.
    fn chi_squared(a: &[f64; NUM_BINS], b: &[f64; NUM_BINS]) -> f64 {
        let mut sum = 0.0;
        for i in 0..NUM_BINS {
            let denom = a[i] + b[i];
            if denom > 1e-10 {
                let diff = a[i] - b[i];
                sum += (diff * diff) / denom;
            }
        }
        sum
    }
}

impl Similarity for HistogramSimilarity {
    fn compare(&self, a: &GrayImage, b: &GrayImage) -> Result<f64, SimilarityError> {
        ensure_same_shape(a, b)?;
        if a.width() == 0 || a.height() == 0 {
            return Err(SimilarityError::Compare("empty image".into()));
        }
        let distance = Self::chi_squared(&Self::histogram(a), &Self::histogram(b));
        Ok((1.0 - distance / 2.0).clamp(0.0, 1.0))
    }

    fn name(&self) -> &str {
        "histogram"
    }
}
