//! Reinhard–Devlin global/local photoreceptor operator.

use serde::{Deserialize, Serialize};

use super::{ToneMapOperator, gamma_normalize, invalid_parameter};
use crate::compute::image::{Image, LOG_EPSILON};
use crate::schema::ToneMapKind;

/// Reinhard–Devlin operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reinhard {
    /// Display gamma.
    pub gamma: f32,
    /// Overall brightness; larger is brighter.
    pub intensity: f32,
    /// 0 adapts to the global mean, 1 to each pixel.
    pub light_adapt: f32,
    /// 0 adapts per luminance, 1 per channel.
    pub color_adapt: f32,
}

impl Default for Reinhard {
    fn default() -> Self {
        Self {
            gamma: 1.0,
            intensity: 0.0,
            light_adapt: 1.0,
            color_adapt: 0.0,
        }
    }
}

impl ToneMapOperator for Reinhard {
    const KIND: ToneMapKind = ToneMapKind::Reinhard;
    const PARAMETER_RANGES: &'static [(f32, f32)] =
        &[(0.5, 3.0), (-8.0, 8.0), (0.0, 1.0), (0.0, 1.0)];

    fn parameter(&self, index: usize) -> f32 {
        match index {
            0 => self.gamma,
            1 => self.intensity,
            2 => self.light_adapt,
            3 => self.color_adapt,
            _ => invalid_parameter(Self::KIND, index),
        }
    }

    fn set_parameter(&mut self, index: usize, value: f32) {
        match index {
            0 => self.gamma = value,
            1 => self.intensity = value,
            2 => self.light_adapt = value,
            3 => self.color_adapt = value,
            _ => invalid_parameter(Self::KIND, index),
        }
    }

    fn apply(&self, image: &Image) -> Image {
        let gray = image.luminance_map();
        let count = gray.len().max(1) as f32;

        let logs: Vec<f32> = gray
            .iter()
            .map(|&g| (g.max(0.0) + LOG_EPSILON).ln())
            .collect();
        let log_mean = logs.iter().sum::<f32>() / count;
        let log_min = logs.iter().copied().fold(f32::INFINITY, f32::min);
        let log_max = logs.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        // Key of the scene: brighter for images dominated by dark pixels.
        let log_span = log_max - log_min;
        let key_ratio = if log_span > f32::EPSILON {
            ((log_max - log_mean) / log_span).max(0.0)
        } else {
            0.0
        };
        let map_key = 0.3 + 0.7 * key_ratio.powf(1.4);

        let intensity = (-self.intensity).exp();
        let gray_mean = gray.iter().sum::<f32>() / count;
        let channel_means = image.channel_means();

        let mut out = image.clone();
        for (pixel, &g) in out.pixels.iter_mut().zip(&gray) {
            for (c, value) in pixel.iter_mut().enumerate() {
                let v = value.max(0.0);
                let local = self.color_adapt * v + (1.0 - self.color_adapt) * g.max(0.0);
                let global =
                    self.color_adapt * channel_means[c] + (1.0 - self.color_adapt) * gray_mean;
                let adapt = self.light_adapt * local + (1.0 - self.light_adapt) * global;
                let adapt = (intensity * adapt).max(0.0).powf(map_key);

                let denom = v + adapt;
                *value = if denom > 0.0 { v / denom } else { 0.0 };
            }
        }

        gamma_normalize(&mut out, self.gamma);
        out
    }
}
