//! Uchimura (Gran Turismo) filmic curve: toe, linear section and shoulder.

use serde::{Deserialize, Serialize};

use super::{ToneMapOperator, invalid_parameter};
use crate::compute::image::Image;
use crate::schema::ToneMapKind;

/// Uchimura operator, applied per channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Uchimura {
    pub max_brightness: f32,
    pub contrast: f32,
    pub linear_start: f32,
    pub linear_length: f32,
    pub black_tightness_shape: f32,
    pub black_tightness_offset: f32,
}

impl Default for Uchimura {
    fn default() -> Self {
        Self {
            max_brightness: 1.0,
            contrast: 1.0,
            linear_start: 0.22,
            linear_length: 0.4,
            black_tightness_shape: 1.33,
            black_tightness_offset: 0.0,
        }
    }
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

impl Uchimura {
    fn curve(&self, x: f32) -> f32 {
        let p = self.max_brightness;
        let a = self.contrast;
        let m = self.linear_start;
        let c = self.black_tightness_shape;
        let b = self.black_tightness_offset;

        let l0 = (p - m) * self.linear_length / a;
        let s0 = m + l0;
        let s1 = m + a * l0;
        let c2 = a * p / (p - s1);
        let cp = -c2 / p;

        let w0 = 1.0 - smoothstep(0.0, m, x);
        let w2 = if x >= m + l0 { 1.0 } else { 0.0 };
        let w1 = 1.0 - w0 - w2;

        let toe = m * (x / m).powf(c) + b;
        let linear = m + a * (x - m);
        let shoulder = p - (p - s1) * (cp * (x - s0)).exp();

        (toe * w0 + linear * w1 + shoulder * w2).clamp(0.0, 1.0)
    }
}

impl ToneMapOperator for Uchimura {
    const KIND: ToneMapKind = ToneMapKind::Uchimura;
    const PARAMETER_RANGES: &'static [(f32, f32)] = &[
        (1.0, 1.0),
        (0.01, 1.0),
        (0.01, 1.0),
        (0.01, 0.99),
        (1.0, 3.0),
        (0.0, 1.0),
    ];

    fn parameter(&self, index: usize) -> f32 {
        match index {
            0 => self.max_brightness,
            1 => self.contrast,
            2 => self.linear_start,
            3 => self.linear_length,
            4 => self.black_tightness_shape,
            5 => self.black_tightness_offset,
            _ => invalid_parameter(Self::KIND, index),
        }
    }

    fn set_parameter(&mut self, index: usize, value: f32) {
        match index {
            0 => self.max_brightness = value,
            1 => self.contrast = value,
            2 => self.linear_start = value,
            3 => self.linear_length = value,
            4 => self.black_tightness_shape = value,
            5 => self.black_tightness_offset = value,
            _ => invalid_parameter(Self::KIND, index),
        }
    }

    fn apply(&self, image: &Image) -> Image {
        image.map(|pixel| pixel.map(|c| self.curve(c.max(0.0))))
    }
}
