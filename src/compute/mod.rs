//! Compute module - images, tone-map operators, compositing and evolution.

mod compose;
mod image;

pub mod evolution;
pub mod tonemap;

pub use compose::*;
pub use image::*;
