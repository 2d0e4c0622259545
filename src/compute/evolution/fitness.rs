//! Image-quality fitness for tone-mapped output.
//!
//! The default scorer blends four no-reference metrics, each computed on a
//! composited image in `[0, 1]`:
//!
//! - **Entropy**: Shannon entropy (bits) of a 256-bin intensity histogram
//! - **Contrast**: standard deviation of luminance
//! - **Saturation**: mean HSV saturation
//! - **Sharpness**: per-pixel mean of the squared Sobel gradient magnitude,
//!   summed over the three channels
//!
//! Metrics are pre-scaled so that typical values are of similar magnitude
//! before the configured weights are applied. Sharpness is averaged per pixel
//! rather than summed, so its scale does not depend on image size.

use serde::{Deserialize, Serialize};

use crate::compute::image::Image;
use crate::schema::FitnessWeights;

const ENTROPY_SCALE: f32 = 10.0;
const CONTRAST_SCALE: f32 = 100.0;
const SATURATION_SCALE: f32 = 10.0;
const SHARPNESS_SCALE: f32 = 10.0;

const HISTOGRAM_BINS: usize = 256;

/// Scores a composited image; higher is better.
///
/// Implementations are shared by reference across evaluation threads and
/// must be deterministic.
pub trait FitnessFunction: Send + Sync {
    fn score(&self, image: &Image) -> f32;
}

/// Per-metric scores of one image, before weighting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FitnessBreakdown {
    pub entropy: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub sharpness: f32,
    /// Weighted, scaled sum of the above.
    pub total: f32,
}

/// Default scorer: weighted blend of entropy, contrast, saturation and
/// sharpness.
#[derive(Debug, Clone, Default)]
pub struct FitnessEvaluator {
    weights: FitnessWeights,
}

impl FitnessEvaluator {
    /// Create a new fitness evaluator.
    pub fn new(weights: FitnessWeights) -> Self {
        Self { weights }
    }

    /// Evaluate every metric and the combined score.
    pub fn evaluate(&self, image: &Image) -> FitnessBreakdown {
        let entropy = entropy(image);
        let contrast = contrast(image);
        let saturation = saturation(image);
        let sharpness = sharpness(image);

        let total = entropy * ENTROPY_SCALE * self.weights.entropy
            + contrast * CONTRAST_SCALE * self.weights.contrast
            + saturation * SATURATION_SCALE * self.weights.saturation
            + sharpness * SHARPNESS_SCALE * self.weights.sharpness;

        FitnessBreakdown {
            entropy,
            contrast,
            saturation,
            sharpness,
            total,
        }
    }
}

impl FitnessFunction for FitnessEvaluator {
    fn score(&self, image: &Image) -> f32 {
        self.evaluate(image).total
    }
}

/// Shannon entropy (bits) of the histogram of `(r + g + b) * 255 / 3`.
pub fn entropy(image: &Image) -> f32 {
    if image.pixels.is_empty() {
        return 0.0;
    }

    let mut histogram = [0u32; HISTOGRAM_BINS];
    for p in &image.pixels {
        let intensity = (p[0] + p[1] + p[2]) * 255.0 / 3.0;
        let bin = (intensity.max(0.0) as usize).min(HISTOGRAM_BINS - 1);
        histogram[bin] += 1;
    }

    let n = image.pixels.len() as f32;
    histogram
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f32 / n;
            -p * p.log2()
        })
        .sum()
}

/// Standard deviation of luminance.
pub fn contrast(image: &Image) -> f32 {
    if image.pixels.is_empty() {
        return 0.0;
    }
    let lum = image.luminance_map();
    let n = lum.len() as f32;
    let mean = lum.iter().sum::<f32>() / n;
    let variance = lum.iter().map(|l| (l - mean).powi(2)).sum::<f32>() / n;
    variance.sqrt()
}

/// Mean HSV saturation `(max - min) / max`; black pixels count as 0.
pub fn saturation(image: &Image) -> f32 {
    if image.pixels.is_empty() {
        return 0.0;
    }
    let sum: f32 = image
        .pixels
        .iter()
        .map(|p| {
            let max = p[0].max(p[1]).max(p[2]);
            let min = p[0].min(p[1]).min(p[2]);
            if max > 0.0 { (max - min) / max } else { 0.0 }
        })
        .sum();
    sum / image.pixels.len() as f32
}

/// Mean over pixels of the squared 3x3 Sobel gradient magnitude, summed
/// over the RGB channels.
///
/// Borders replicate the edge pixel.
pub fn sharpness(image: &Image) -> f32 {
    let (w, h) = (image.width, image.height);
    if w == 0 || h == 0 {
        return 0.0;
    }
    let at = |x: isize, y: isize, c: usize| -> f32 {
        let xi = x.clamp(0, w as isize - 1) as usize;
        let yi = y.clamp(0, h as isize - 1) as usize;
        image.pixels[yi * w + xi][c]
    };

    let mut sum = 0.0f32;
    for y in 0..h as isize {
        for x in 0..w as isize {
            for c in 0..3 {
                let gx = (at(x + 1, y - 1, c) + 2.0 * at(x + 1, y, c) + at(x + 1, y + 1, c))
                    - (at(x - 1, y - 1, c) + 2.0 * at(x - 1, y, c) + at(x - 1, y + 1, c));
                let gy = (at(x - 1, y + 1, c) + 2.0 * at(x, y + 1, c) + at(x + 1, y + 1, c))
                    - (at(x - 1, y - 1, c) + 2.0 * at(x, y - 1, c) + at(x + 1, y - 1, c));
                sum += gx * gx + gy * gy;
            }
        }
    }
    sum / (w * h) as f32
}
