//! Tone-map operators.
//!
//! Every operator exposes the same capability set: an indexed parameter
//! vector with declared `[min, max]` ranges, a blend weight, deep cloning and
//! an `apply` that maps a linear HDR image to a displayable one. The
//! evolutionary search never looks past that contract except to pick a random
//! [`ToneMapKind`] and to key the innovation table with it.
//!
//! Operators are stateless between calls: any image statistic they need
//! (average luminance, log-mean, maximum) is computed inside `apply` and every
//! call returns a freshly allocated image, so clones can be evaluated on
//! different threads without sharing scratch buffers.

mod drago;
mod mantiuk;
mod reinhard;
mod tumblin_rushmeier;
mod uchimura;
mod uncharted2;

use serde::{Deserialize, Serialize};

pub use drago::Drago;
pub use mantiuk::Mantiuk;
pub use reinhard::Reinhard;
pub use tumblin_rushmeier::TumblinRushmeier;
pub use uchimura::Uchimura;
pub use uncharted2::Uncharted2;

use super::image::Image;
use crate::schema::ToneMapKind;

/// A concrete tone-mapping operator with an indexed parameter vector.
pub trait ToneMapOperator {
    /// Kind discriminant.
    const KIND: ToneMapKind;

    /// Declared `[min, max]` range per parameter index.
    const PARAMETER_RANGES: &'static [(f32, f32)];

    /// Read a parameter. Panics on an invalid index.
    fn parameter(&self, index: usize) -> f32;

    /// Write a parameter. Panics on an invalid index.
    fn set_parameter(&mut self, index: usize, value: f32);

    /// Map a linear HDR image to a new image.
    fn apply(&self, image: &Image) -> Image;
}

/// Closed set of operator variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Operator {
    Reinhard(Reinhard),
    TumblinRushmeier(TumblinRushmeier),
    Drago(Drago),
    Mantiuk(Mantiuk),
    Uchimura(Uchimura),
    Uncharted2(Uncharted2),
}

macro_rules! dispatch {
    ($operator:expr, $op:ident => $body:expr) => {
        match $operator {
            Operator::Reinhard($op) => $body,
            Operator::TumblinRushmeier($op) => $body,
            Operator::Drago($op) => $body,
            Operator::Mantiuk($op) => $body,
            Operator::Uchimura($op) => $body,
            Operator::Uncharted2($op) => $body,
        }
    };
}

/// Parameter ranges of an operator kind.
fn ranges_of(kind: ToneMapKind) -> &'static [(f32, f32)] {
    match kind {
        ToneMapKind::Reinhard => Reinhard::PARAMETER_RANGES,
        ToneMapKind::TumblinRushmeier => TumblinRushmeier::PARAMETER_RANGES,
        ToneMapKind::Drago => Drago::PARAMETER_RANGES,
        ToneMapKind::Mantiuk => Mantiuk::PARAMETER_RANGES,
        ToneMapKind::Uchimura => Uchimura::PARAMETER_RANGES,
        ToneMapKind::Uncharted2 => Uncharted2::PARAMETER_RANGES,
    }
}

/// A weighted operator instance: the payload of a gene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToneMap {
    /// Blend weight in `[0, 1]`.
    pub weight: f32,
    /// Operator and its parameters.
    pub operator: Operator,
}

impl ToneMap {
    /// Create an operator of the given kind with default parameters.
    pub fn new(kind: ToneMapKind) -> Self {
        let operator = match kind {
            ToneMapKind::Reinhard => Operator::Reinhard(Reinhard::default()),
            ToneMapKind::TumblinRushmeier => {
                Operator::TumblinRushmeier(TumblinRushmeier::default())
            }
            ToneMapKind::Drago => Operator::Drago(Drago::default()),
            ToneMapKind::Mantiuk => Operator::Mantiuk(Mantiuk::default()),
            ToneMapKind::Uchimura => Operator::Uchimura(Uchimura::default()),
            ToneMapKind::Uncharted2 => Operator::Uncharted2(Uncharted2::default()),
        };
        Self {
            weight: 1.0,
            operator,
        }
    }

    /// Operator kind.
    pub fn kind(&self) -> ToneMapKind {
        match self.operator {
            Operator::Reinhard(_) => ToneMapKind::Reinhard,
            Operator::TumblinRushmeier(_) => ToneMapKind::TumblinRushmeier,
            Operator::Drago(_) => ToneMapKind::Drago,
            Operator::Mantiuk(_) => ToneMapKind::Mantiuk,
            Operator::Uchimura(_) => ToneMapKind::Uchimura,
            Operator::Uncharted2(_) => ToneMapKind::Uncharted2,
        }
    }

    /// Number of parameters.
    #[inline]
    pub fn parameter_count(&self) -> usize {
        ranges_of(self.kind()).len()
    }

    /// Read a parameter. Panics on an invalid index.
    pub fn parameter(&self, index: usize) -> f32 {
        dispatch!(&self.operator, op => op.parameter(index))
    }

    /// Write a parameter. Panics on an invalid index.
    pub fn set_parameter(&mut self, index: usize, value: f32) {
        dispatch!(&mut self.operator, op => op.set_parameter(index, value))
    }

    /// Declared `[min, max]` range of a parameter. Panics on an invalid index.
    pub fn parameter_range(&self, index: usize) -> (f32, f32) {
        let ranges = ranges_of(self.kind());
        assert!(
            index < ranges.len(),
            "{:?} has {} parameters, index {} is out of range",
            self.kind(),
            ranges.len(),
            index
        );
        ranges[index]
    }

    /// Parameter mapped into `[0, 1]` by its declared range.
    ///
    /// A zero-width range normalizes to 0.
    pub fn normalized_parameter(&self, index: usize) -> f32 {
        let (min, max) = self.parameter_range(index);
        let span = max - min;
        if span.abs() <= f32::EPSILON {
            0.0
        } else {
            (self.parameter(index) - min) / span
        }
    }

    /// Tone map an HDR image.
    pub fn apply(&self, image: &Image) -> Image {
        dispatch!(&self.operator, op => op.apply(image))
    }
}

/// Fail fast on a parameter index the operator does not have.
#[track_caller]
pub(crate) fn invalid_parameter(kind: ToneMapKind, index: usize) -> ! {
    panic!(
        "{kind:?} has {} parameters, index {index} is out of range",
        ranges_of(kind).len()
    )
}

/// Normalize by the brightest channel value, then apply display gamma.
pub(crate) fn gamma_normalize(image: &mut Image, gamma: f32) {
    let max = image
        .pixels
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .fold(0.0f32, f32::max);
    if max <= 0.0 {
        return;
    }
    let inv_gamma = 1.0 / gamma.max(1e-3);
    for p in &mut image.pixels {
        for c in p.iter_mut() {
            *c = (*c / max).max(0.0).powf(inv_gamma);
        }
    }
}
