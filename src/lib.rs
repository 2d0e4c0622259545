//! Genetic Tone Mapping - evolving composite HDR tone-mapping recipes.
//!
//! A recipe is a weighted blend of tone-map operators (Reinhard, Drago,
//! Mantiuk, ...) each with its own continuous parameters. Recipes are evolved
//! with a NEAT-inspired speciated genetic algorithm: innovation ids align
//! homologous genes, a compatibility distance clusters the population into
//! species, and fitness sharing within species preserves diversity.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Configuration types, reference scenes and run reports
//! - `compute`: Images, tone-map operators, compositing and the evolution engine
//!
//! # Example
//!
//! ```rust,no_run
//! use genetic_tonemap::{
//!     compute::{Image, compose},
//!     compute::evolution::EvolutionEngine,
//!     schema::{EvolutionConfig, Scene},
//! };
//!
//! let config = EvolutionConfig {
//!     random_seed: Some(7),
//!     ..Default::default()
//! };
//! let mut engine = EvolutionEngine::from_config(config).unwrap();
//! for _ in 0..10 {
//!     let report = engine.epoch();
//!     println!("epoch {}: {:.3}", report.epoch, report.best_fitness);
//! }
//!
//! let best = engine.best().unwrap();
//! let preview = compose(&Image::from_scene(&Scene::default(), 320, 240), &best.genes);
//! println!("preview is {}x{}", preview.width, preview.height);
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::evolution::{Chromosome, EvolutionEngine, EvolutionResult, Gene};
pub use compute::{Image, compose};
pub use schema::{EvolutionConfig, Scene, ToneMapKind};
