//! Tumblin–Rushmeier brightness-preserving operator.

use serde::{Deserialize, Serialize};

use super::{ToneMapOperator, invalid_parameter};
use crate::compute::image::{Image, LOG_EPSILON, luminance};
use crate::schema::ToneMapKind;

/// Tumblin–Rushmeier operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TumblinRushmeier {
    /// Maximum display luminance.
    pub ld_max: f32,
    /// Maximum display contrast.
    pub c_max: f32,
}

impl Default for TumblinRushmeier {
    fn default() -> Self {
        Self {
            ld_max: 1.0,
            c_max: 1.0,
        }
    }
}

/// Stevens' power-law exponent and offset for an adaptation luminance.
fn stevens(adaptation: f32) -> (f32, f32) {
    let log_l = adaptation.max(LOG_EPSILON).log10() + 0.84;
    let alpha = 0.4 * log_l + 2.92;
    let beta = -0.4 * log_l * log_l - 2.584 * log_l + 2.0208;
    (alpha, beta)
}

impl ToneMapOperator for TumblinRushmeier {
    const KIND: ToneMapKind = ToneMapKind::TumblinRushmeier;
    const PARAMETER_RANGES: &'static [(f32, f32)] = &[(1.0, 300.0), (1.0, 100.0)];

    fn parameter(&self, index: usize) -> f32 {
        match index {
            0 => self.ld_max,
            1 => self.c_max,
            _ => invalid_parameter(Self::KIND, index),
        }
    }

    fn set_parameter(&mut self, index: usize, value: f32) {
        match index {
            0 => self.ld_max = value,
            1 => self.c_max = value,
            _ => invalid_parameter(Self::KIND, index),
        }
    }

    fn apply(&self, image: &Image) -> Image {
        let (alpha_rw, beta_rw) = stevens(image.average_luminance());
        let (alpha_d, beta_d) = stevens(self.ld_max / self.c_max.sqrt());

        let exponent = alpha_rw / alpha_d;
        let gain = 10f32.powf((beta_rw - beta_d) / alpha_d) / self.ld_max;
        let offset = 1.0 / self.c_max;

        image.map(|pixel| {
            let lum = luminance(pixel);
            if lum <= 0.0 {
                return [0.0; 3];
            }
            let mapped = lum.powf(exponent) * gain - offset;
            pixel.map(|c| c / lum * mapped)
        })
    }
}
