//! Mantiuk-style contrast-domain compression.
//!
//! A global approximation: log-luminance contrast is scaled about the scene's
//! log mean, then color is restored with a saturation exponent.

use serde::{Deserialize, Serialize};

use super::{ToneMapOperator, gamma_normalize, invalid_parameter};
use crate::compute::image::{Image, LOG_EPSILON, luminance};
use crate::schema::ToneMapKind;

/// Mantiuk operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mantiuk {
    /// Display gamma.
    pub gamma: f32,
    /// Contrast scale factor; smaller compresses more.
    pub scale: f32,
    /// Color saturation exponent.
    pub saturation: f32,
}

impl Default for Mantiuk {
    fn default() -> Self {
        Self {
            gamma: 1.0,
            scale: 0.75,
            saturation: 1.0,
        }
    }
}

impl ToneMapOperator for Mantiuk {
    const KIND: ToneMapKind = ToneMapKind::Mantiuk;
    const PARAMETER_RANGES: &'static [(f32, f32)] = &[(0.5, 3.0), (0.1, 1.0), (0.0, 2.0)];

    fn parameter(&self, index: usize) -> f32 {
        match index {
            0 => self.gamma,
            1 => self.scale,
            2 => self.saturation,
            _ => invalid_parameter(Self::KIND, index),
        }
    }

    fn set_parameter(&mut self, index: usize, value: f32) {
        match index {
            0 => self.gamma = value,
            1 => self.scale = value,
            2 => self.saturation = value,
            _ => invalid_parameter(Self::KIND, index),
        }
    }

    fn apply(&self, image: &Image) -> Image {
        let log_mean = image.log_average_luminance().log10();

        let mut out = image.map(|pixel| {
            let lum = luminance(pixel);
            if lum <= 0.0 {
                return [0.0; 3];
            }
            let log_lum = (lum + LOG_EPSILON).log10();
            let mapped = 10f32.powf(self.scale * (log_lum - log_mean));
            pixel.map(|c| (c.max(0.0) / lum).powf(self.saturation) * mapped)
        });

        gamma_normalize(&mut out, self.gamma);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_compresses_contrast() {
        let image = Image::from_fn(2, 1, |x, _| if x == 0 { [0.01; 3] } else { [100.0; 3] });
        let strong = Mantiuk {
            scale: 0.2,
            ..Default::default()
        }
        .apply(&image);
        let weak = Mantiuk {
            scale: 1.0,
            ..Default::default()
        }
        .apply(&image);
        // Both are normalized to the bright pixel; stronger compression lifts the dark one.
        assert!(strong.pixels[0][0] > weak.pixels[0][0]);
    }
}
