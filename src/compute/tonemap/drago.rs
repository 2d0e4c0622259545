//! Drago adaptive logarithmic mapping.

use serde::{Deserialize, Serialize};

use super::{ToneMapOperator, gamma_normalize, invalid_parameter};
use crate::compute::image::{Image, luminance};
use crate::schema::ToneMapKind;

/// Drago operator: logarithmic compression whose base varies with luminance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drago {
    /// Display gamma.
    pub gamma: f32,
    /// Color saturation exponent.
    pub saturation: f32,
    /// Bias of the adaptive log base; 0.85 is the usual choice.
    pub bias: f32,
}

impl Default for Drago {
    fn default() -> Self {
        Self {
            gamma: 1.0,
            saturation: 1.0,
            bias: 0.85,
        }
    }
}

impl ToneMapOperator for Drago {
    const KIND: ToneMapKind = ToneMapKind::Drago;
    const PARAMETER_RANGES: &'static [(f32, f32)] = &[(0.5, 3.0), (0.0, 2.0), (0.7, 0.9)];

    fn parameter(&self, index: usize) -> f32 {
        match index {
            0 => self.gamma,
            1 => self.saturation,
            2 => self.bias,
            _ => invalid_parameter(Self::KIND, index),
        }
    }

    fn set_parameter(&mut self, index: usize, value: f32) {
        match index {
            0 => self.gamma = value,
            1 => self.saturation = value,
            2 => self.bias = value,
            _ => invalid_parameter(Self::KIND, index),
        }
    }

    fn apply(&self, image: &Image) -> Image {
        let log_mean = image.log_average_luminance();
        let max = image.max_luminance() / log_mean;
        if max <= 0.0 {
            return Image::new(image.width, image.height);
        }

        let exponent = self.bias.max(1e-3).ln() / 0.5f32.ln();
        let scale = 1.0 / (max + 1.0).log10();

        let mut out = image.map(|pixel| {
            let lum = luminance(pixel);
            if lum <= 0.0 {
                return [0.0; 3];
            }
            let l = lum / log_mean;
            let base = (2.0 + 8.0 * (l / max).powf(exponent)).ln();
            let mapped = scale * (l + 1.0).ln() / base;
            pixel.map(|c| (c.max(0.0) / lum).powf(self.saturation) * mapped)
        });

        gamma_normalize(&mut out, self.gamma);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Scene;

    #[test]
    fn test_monotonic_in_luminance() {
        let image = Image::from_fn(4, 1, |x, _| [10f32.powi(x as i32 - 1); 3]);
        let out = Drago::default().apply(&image);
        for pair in out.pixels.windows(2) {
            assert!(pair[1][0] >= pair[0][0]);
        }
    }

    #[test]
    fn test_output_in_unit_range() {
        let image = Image::from_scene(&Scene::default(), 32, 24);
        let out = Drago::default().apply(&image);
        assert!(out.pixels.iter().flatten().all(|c| (0.0..=1.0).contains(c)));
    }
}
