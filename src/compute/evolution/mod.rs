//! NEAT-style evolution of composite tone-mapping operators.
//!
//! # Overview
//!
//! The evolutionary search system consists of:
//!
//! - **Fitness** (`fitness`): pluggable image-quality scoring
//! - **Genome** (`genome`): genes, chromosomes, innovation ids, crossover and mutation
//! - **Species** (`species`): compatibility distance and first-match speciation
//! - **Search** (`search`): the epoch driver with fitness sharing, elitism and
//!   roulette-wheel reproduction
//!
//! # Example
//!
//! ```rust,no_run
//! use genetic_tonemap::schema::EvolutionConfig;
//! use genetic_tonemap::compute::evolution::EvolutionEngine;
//!
//! let config = EvolutionConfig {
//!     random_seed: Some(1),
//!     ..Default::default()
//! };
//!
//! let mut engine = EvolutionEngine::from_config(config).unwrap();
//! let result = engine.run_with_callback(|progress| {
//!     println!("Epoch {}: best fitness = {:.3}", progress.epoch, progress.best_fitness);
//! });
//!
//! println!("Best recipe has {} genes", result.best.genes.len());
//! ```

mod fitness;
mod genome;
mod search;
mod species;

pub use fitness::{
    FitnessBreakdown, FitnessEvaluator, FitnessFunction, contrast, entropy, saturation, sharpness,
};
pub use genome::{Chromosome, Gene, GenomeRng, InnovationTable};
pub use search::{EvolutionEngine, EvolutionError, EvolutionResult};
pub use species::{Species, compatibility_distance, insert_into_population};
