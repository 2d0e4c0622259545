//! Hable "Uncharted 2" filmic curve.

use serde::{Deserialize, Serialize};

use super::{ToneMapOperator, invalid_parameter};
use crate::compute::image::Image;
use crate::schema::ToneMapKind;

const EXPOSURE_BIAS: f32 = 2.0;

/// Uncharted 2 operator, applied per channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Uncharted2 {
    pub shoulder_strength: f32,
    pub linear_strength: f32,
    pub linear_angle: f32,
    pub toe_strength: f32,
    pub toe_numerator: f32,
    pub toe_denominator: f32,
    pub white_point: f32,
}

impl Default for Uncharted2 {
    fn default() -> Self {
        Self {
            shoulder_strength: 0.15,
            linear_strength: 0.5,
            linear_angle: 0.1,
            toe_strength: 0.2,
            toe_numerator: 0.02,
            toe_denominator: 0.3,
            white_point: 11.2,
        }
    }
}

impl Uncharted2 {
    fn curve(&self, x: f32) -> f32 {
        let a = self.shoulder_strength;
        let b = self.linear_strength;
        let c = self.linear_angle;
        let d = self.toe_strength;
        let e = self.toe_numerator;
        let f = self.toe_denominator;
        (x * (a * x + c * b) + d * e) / (x * (a * x + b) + d * f) - e / f
    }
}

impl ToneMapOperator for Uncharted2 {
    const KIND: ToneMapKind = ToneMapKind::Uncharted2;
    const PARAMETER_RANGES: &'static [(f32, f32)] = &[
        (0.05, 0.5),
        (0.1, 1.0),
        (0.01, 0.5),
        (0.05, 0.5),
        (0.005, 0.05),
        (0.1, 0.5),
        (1.0, 20.0),
    ];

    fn parameter(&self, index: usize) -> f32 {
        match index {
            0 => self.shoulder_strength,
            1 => self.linear_strength,
            2 => self.linear_angle,
            3 => self.toe_strength,
            4 => self.toe_numerator,
            5 => self.toe_denominator,
            6 => self.white_point,
            _ => invalid_parameter(Self::KIND, index),
        }
    }

    fn set_parameter(&mut self, index: usize, value: f32) {
        match index {
            0 => self.shoulder_strength = value,
            1 => self.linear_strength = value,
            2 => self.linear_angle = value,
            3 => self.toe_strength = value,
            4 => self.toe_numerator = value,
            5 => self.toe_denominator = value,
            6 => self.white_point = value,
            _ => invalid_parameter(Self::KIND, index),
        }
    }

    fn apply(&self, image: &Image) -> Image {
        let white_scale = 1.0 / self.curve(self.white_point);
        image.map(|pixel| pixel.map(|c| self.curve(EXPOSURE_BIAS * c.max(0.0)) * white_scale))
    }
}
