//! Schema module - Configuration, scene and reporting types for evolution runs.

mod config;
mod evolution;
mod scene;

pub use config::*;
pub use evolution::*;
pub use scene::*;
