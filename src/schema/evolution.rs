//! Evolution configuration types for the speciated tone-mapping search.
//!
//! This module provides the configuration record consumed by the evolution
//! engine together with the progress and result types it reports.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{ConfigError, TrainingConfig};

/// Top-level configuration for a tone-mapping evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Population and epoch settings.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Crossover and mutation probabilities.
    #[serde(default)]
    pub reproduction: ReproductionConfig,
    /// Elite preservation settings.
    #[serde(default)]
    pub elitism: ElitismConfig,
    /// Compatibility distance constants and species threshold.
    #[serde(default)]
    pub species: SpeciesConfig,
    /// Weights of the image-quality metrics.
    #[serde(default)]
    pub fitness: FitnessWeights,
    /// Operator kinds structural mutation may introduce.
    #[serde(default = "default_operators")]
    pub operators: Vec<ToneMapKind>,
    /// Reference scenes.
    #[serde(default)]
    pub training: TrainingConfig,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population: PopulationConfig::default(),
            reproduction: ReproductionConfig::default(),
            elitism: ElitismConfig::default(),
            species: SpeciesConfig::default(),
            fitness: FitnessWeights::default(),
            operators: default_operators(),
            training: TrainingConfig::default(),
            random_seed: None,
        }
    }
}

fn default_operators() -> Vec<ToneMapKind> {
    vec![
        ToneMapKind::Reinhard,
        ToneMapKind::TumblinRushmeier,
        ToneMapKind::Drago,
        ToneMapKind::Mantiuk,
    ]
}

/// Tone-map operator kinds.
///
/// Also the key of the per-epoch innovation table, so the discriminant must
/// stay stable for the lifetime of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToneMapKind {
    Reinhard,
    TumblinRushmeier,
    Drago,
    Mantiuk,
    Uchimura,
    Uncharted2,
}

impl ToneMapKind {
    /// Every supported kind.
    pub const ALL: [ToneMapKind; 6] = [
        ToneMapKind::Reinhard,
        ToneMapKind::TumblinRushmeier,
        ToneMapKind::Drago,
        ToneMapKind::Mantiuk,
        ToneMapKind::Uchimura,
        ToneMapKind::Uncharted2,
    ];
}

/// Population and epoch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of individuals, conserved across epochs.
    #[serde(default = "default_population_size")]
    pub size: usize,
    /// Maximum number of epochs.
    #[serde(default = "default_max_epochs")]
    pub max_epochs: usize,
    /// Target raw fitness to stop early.
    #[serde(default)]
    pub target_fitness: Option<f32>,
    /// Stagnation limit: stop if no improvement for N epochs.
    #[serde(default)]
    pub stagnation_limit: Option<usize>,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
            max_epochs: default_max_epochs(),
            target_fitness: None,
            stagnation_limit: None,
        }
    }
}

fn default_population_size() -> usize {
    150
}
fn default_max_epochs() -> usize {
    100
}

/// Crossover and mutation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReproductionConfig {
    /// Probability that a homologous gene is taken from the weaker parent.
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f32,
    /// Probability of appending a structurally new gene.
    #[serde(default = "default_add_gene_chance")]
    pub add_gene_chance: f32,
    /// Probability of deleting a random gene.
    #[serde(default = "default_remove_gene_chance")]
    pub remove_gene_chance: f32,
    /// Mutation magnitude, as a fraction of each parameter's range.
    /// Also the initial weight of a newly added gene.
    #[serde(default = "default_weight_mutation")]
    pub weight_mutation: f32,
}

impl Default for ReproductionConfig {
    fn default() -> Self {
        Self {
            crossover_rate: default_crossover_rate(),
            add_gene_chance: default_add_gene_chance(),
            remove_gene_chance: default_remove_gene_chance(),
            weight_mutation: default_weight_mutation(),
        }
    }
}

fn default_crossover_rate() -> f32 {
    0.5
}
fn default_add_gene_chance() -> f32 {
    0.01
}
fn default_remove_gene_chance() -> f32 {
    0.1
}
fn default_weight_mutation() -> f32 {
    0.1
}

/// Elitism: the `best` top individuals by raw fitness are inserted
/// `copies` times, un-mutated, into the next population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElitismConfig {
    #[serde(default = "default_elite_best")]
    pub best: usize,
    #[serde(default = "default_elite_copies")]
    pub copies: usize,
}

impl Default for ElitismConfig {
    fn default() -> Self {
        Self {
            best: default_elite_best(),
            copies: default_elite_copies(),
        }
    }
}

impl ElitismConfig {
    /// No elites at all.
    pub fn disabled() -> Self {
        Self { best: 0, copies: 0 }
    }
}

fn default_elite_best() -> usize {
    3
}
fn default_elite_copies() -> usize {
    2
}

/// Compatibility distance constants.
///
/// `distance = excess * c1 / n + disjoint * c2 / n + c3 * w`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesConfig {
    /// Excess gene coefficient.
    #[serde(default = "default_c1")]
    pub c1: f32,
    /// Disjoint gene coefficient.
    #[serde(default = "default_c2")]
    pub c2: f32,
    /// Weight/parameter difference coefficient.
    #[serde(default = "default_c3")]
    pub c3: f32,
    /// Gene count normalizer.
    #[serde(default = "default_n")]
    pub n: f32,
    /// Maximum distance to a representative for membership.
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

impl Default for SpeciesConfig {
    fn default() -> Self {
        Self {
            c1: default_c1(),
            c2: default_c2(),
            c3: default_c3(),
            n: default_n(),
            threshold: default_threshold(),
        }
    }
}

fn default_c1() -> f32 {
    1.0
}
fn default_c2() -> f32 {
    1.0
}
fn default_c3() -> f32 {
    4.0
}
fn default_n() -> f32 {
    1.0
}
fn default_threshold() -> f32 {
    3.0
}

/// Weights of the image-quality metrics combined into fitness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitnessWeights {
    #[serde(default = "default_metric_weight")]
    pub entropy: f32,
    #[serde(default = "default_metric_weight")]
    pub contrast: f32,
    #[serde(default = "default_metric_weight")]
    pub saturation: f32,
    #[serde(default = "default_metric_weight")]
    pub sharpness: f32,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            entropy: default_metric_weight(),
            contrast: default_metric_weight(),
            saturation: default_metric_weight(),
            sharpness: default_metric_weight(),
        }
    }
}

fn default_metric_weight() -> f32 {
    1.0
}

// ============================================================================
// Progress and Result Types
// ============================================================================

/// Summary of a single epoch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EpochReport {
    /// Zero-based epoch index.
    pub epoch: usize,
    /// Raw fitness of the population best this epoch.
    pub best_fitness: f32,
    /// Mean raw fitness of the evaluated population.
    pub avg_fitness: f32,
    /// Gene count of the population best.
    pub best_gene_count: usize,
    /// Species in the evaluated population.
    pub species_count: usize,
    /// Individuals in the replacement population.
    pub population_size: usize,
    /// Next innovation id that will be issued.
    pub innovation_counter: u32,
}

/// Progress update emitted after every epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionProgress {
    /// Epochs completed.
    pub epoch: usize,
    /// Total epochs planned.
    pub total_epochs: usize,
    /// Best raw fitness seen so far.
    pub best_fitness: f32,
    /// Best raw fitness of the last epoch.
    pub epoch_best: f32,
    /// Mean raw fitness of the last epoch.
    pub avg_fitness: f32,
    /// Member count of each live species.
    pub species_sizes: Vec<usize>,
    /// Epochs since last improvement.
    pub stagnation_count: usize,
    /// Statistics history for plotting.
    pub history: EvolutionHistory,
}

/// Evolution history for plotting.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EvolutionHistory {
    /// Best raw fitness per epoch.
    pub best_fitness: Vec<f32>,
    /// Average raw fitness per epoch.
    pub avg_fitness: Vec<f32>,
    /// Species count per epoch.
    pub species_count: Vec<usize>,
}

/// Statistics from an evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionStats {
    /// Total epochs run.
    pub epochs: usize,
    /// Total chromosome evaluations (individuals x reference images).
    pub total_evaluations: u64,
    /// Best raw fitness achieved.
    pub best_fitness: f32,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
    /// Reason for stopping.
    pub stop_reason: StopReason,
}

/// Reason evolution stopped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Reached maximum epochs.
    MaxEpochs,
    /// Reached target fitness.
    TargetReached,
    /// Stagnation limit hit.
    Stagnation,
    /// User cancelled.
    Cancelled,
}

// ============================================================================
// Validation
// ============================================================================

/// Evolution configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionConfigError {
    #[error("Population size must be at least 1")]
    PopulationTooSmall,
    #[error("Probability {name} must lie in [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f32 },
    #[error("Weight mutation must be non-negative, got {0}")]
    InvalidMutation(f32),
    #[error("Species normalizer N must be positive, got {0}")]
    InvalidNormalizer(f32),
    #[error("Invalid species parameter: {0}")]
    InvalidSpecies(String),
    #[error("Invalid fitness weight: {0}")]
    InvalidWeight(String),
    #[error("No operator kinds enabled")]
    NoOperators,
    #[error("Training config validation failed: {0}")]
    TrainingConfigError(#[from] ConfigError),
}

/// Errors loading or saving a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(#[from] EvolutionConfigError),
}

impl EvolutionConfig {
    /// Validate evolution configuration.
    pub fn validate(&self) -> Result<(), EvolutionConfigError> {
        self.training.validate()?;

        if self.population.size == 0 {
            return Err(EvolutionConfigError::PopulationTooSmall);
        }

        let probabilities = [
            ("crossover_rate", self.reproduction.crossover_rate),
            ("add_gene_chance", self.reproduction.add_gene_chance),
            ("remove_gene_chance", self.reproduction.remove_gene_chance),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(EvolutionConfigError::InvalidProbability { name, value });
            }
        }

        if !(self.reproduction.weight_mutation >= 0.0) {
            return Err(EvolutionConfigError::InvalidMutation(
                self.reproduction.weight_mutation,
            ));
        }

        if !(self.species.n > 0.0) {
            return Err(EvolutionConfigError::InvalidNormalizer(self.species.n));
        }
        if self.species.threshold < 0.0 {
            return Err(EvolutionConfigError::InvalidSpecies(format!(
                "threshold {} must be non-negative",
                self.species.threshold
            )));
        }
        for (name, c) in [
            ("c1", self.species.c1),
            ("c2", self.species.c2),
            ("c3", self.species.c3),
        ] {
            if c < 0.0 {
                return Err(EvolutionConfigError::InvalidSpecies(format!(
                    "{name} ({c}) must be non-negative"
                )));
            }
        }

        let weights = [
            ("entropy", self.fitness.entropy),
            ("contrast", self.fitness.contrast),
            ("saturation", self.fitness.saturation),
            ("sharpness", self.fitness.sharpness),
        ];
        for (name, w) in weights {
            if w < 0.0 {
                return Err(EvolutionConfigError::InvalidWeight(format!(
                    "{name} weight {w} must be non-negative"
                )));
            }
        }

        if self.operators.is_empty() {
            return Err(EvolutionConfigError::NoOperators);
        }

        Ok(())
    }

    /// Load and validate a configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        let config: EvolutionConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigLoadError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_valid() {
        let config = EvolutionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.population.size, 150);
        assert_eq!(config.elitism.best, 3);
        assert_eq!(config.elitism.copies, 2);
        assert_eq!(config.operators.len(), 4);
    }

    #[test]
    fn test_serialization() {
        let config = EvolutionConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: EvolutionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.population.size, config.population.size);
        assert_eq!(parsed.operators, config.operators);
        assert_eq!(parsed.training.scenes, config.training.scenes);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "population": { "size": 12 }, "random_seed": 7 }"#;
        let parsed: EvolutionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.population.size, 12);
        assert_eq!(parsed.population.max_epochs, 100);
        assert_eq!(parsed.reproduction.crossover_rate, 0.5);
        assert_eq!(parsed.species.c3, 4.0);
        assert_eq!(parsed.random_seed, Some(7));
    }

    #[test]
    fn test_invalid_probability() {
        let config = EvolutionConfig {
            reproduction: ReproductionConfig {
                add_gene_chance: 1.5,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EvolutionConfigError::InvalidProbability {
                name: "add_gene_chance",
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_species_and_operators() {
        let config = EvolutionConfig {
            species: SpeciesConfig {
                n: 0.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EvolutionConfigError::InvalidNormalizer(_))
        ));

        let config = EvolutionConfig {
            operators: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EvolutionConfigError::NoOperators)
        ));
    }

    #[test]
    fn test_save_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = EvolutionConfig {
            population: PopulationConfig {
                size: 20,
                ..Default::default()
            },
            random_seed: Some(3),
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = EvolutionConfig::load(&path).unwrap();
        assert_eq!(loaded.population.size, 20);
        assert_eq!(loaded.random_seed, Some(3));
    }

    #[test]
    fn test_load_errors() {
        let dir = tempdir().unwrap();

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            EvolutionConfig::load(&missing),
            Err(ConfigLoadError::Io(_))
        ));

        let garbage = dir.path().join("garbage.json");
        fs::write(&garbage, "not json").unwrap();
        assert!(matches!(
            EvolutionConfig::load(&garbage),
            Err(ConfigLoadError::Parse(_))
        ));

        let invalid = dir.path().join("invalid.json");
        fs::write(&invalid, r#"{ "population": { "size": 0 } }"#).unwrap();
        assert!(matches!(
            EvolutionConfig::load(&invalid),
            Err(ConfigLoadError::Invalid(_))
        ));
    }
}
