//! Speciated evolution engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::compute::compose::compose;
use crate::compute::image::Image;
use crate::schema::{
    EpochReport, EvolutionConfig, EvolutionConfigError, EvolutionHistory, EvolutionProgress,
    EvolutionStats, StopReason,
};

use super::fitness::{FitnessEvaluator, FitnessFunction};
use super::genome::{Chromosome, GenomeRng, InnovationTable};
use super::species::{Species, insert_into_population};

/// Errors constructing an engine.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error("Invalid evolution config: {0}")]
    InvalidConfig(#[from] EvolutionConfigError),
    #[error("At least one reference image is required")]
    NoReferenceImages,
    #[error("Reference image {index} has size {found:?}, expected {expected:?}")]
    MismatchedDimensions {
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },
}

/// Outcome of a complete run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionResult {
    /// Best chromosome seen over the whole run, by raw fitness.
    pub best: Chromosome,
    pub stats: EvolutionStats,
    pub history: EvolutionHistory,
}

/// Evolution engine that runs the search.
pub struct EvolutionEngine {
    config: EvolutionConfig,
    rng: GenomeRng,
    scorer: Box<dyn FitnessFunction>,
    references: Vec<Image>,
    population: Vec<Species>,
    innovations: InnovationTable,
    /// Best of the most recent epoch.
    epoch_best: Option<Chromosome>,
    /// Best of the whole run.
    best_ever: Option<Chromosome>,
    best_fitness: f32,
    last_avg_fitness: f32,
    history: EvolutionHistory,
    epoch: usize,
    stagnation_count: usize,
    total_evaluations: u64,
    cancelled: Arc<AtomicBool>,
}

impl EvolutionEngine {
    /// Create an engine over the given reference images.
    ///
    /// The initial population holds `population.size` empty chromosomes.
    pub fn new(config: EvolutionConfig, references: Vec<Image>) -> Result<Self, EvolutionError> {
        config.validate()?;

        let Some(first) = references.first() else {
            return Err(EvolutionError::NoReferenceImages);
        };
        let expected = (first.width, first.height);
        for (index, image) in references.iter().enumerate() {
            let found = (image.width, image.height);
            if found != expected {
                return Err(EvolutionError::MismatchedDimensions {
                    index,
                    expected,
                    found,
                });
            }
        }

        let seed = config.random_seed.unwrap_or_else(rand::random);
        info!(
            "evolution seed {seed}, population {}, {} reference images",
            config.population.size,
            references.len()
        );

        let mut population = Vec::new();
        for _ in 0..config.population.size {
            insert_into_population(&mut population, Chromosome::new(), &config.species);
        }

        Ok(Self {
            rng: GenomeRng::new(seed),
            scorer: Box::new(FitnessEvaluator::new(config.fitness.clone())),
            references,
            population,
            innovations: InnovationTable::new(),
            epoch_best: None,
            best_ever: None,
            best_fitness: f32::NEG_INFINITY,
            last_avg_fitness: 0.0,
            history: EvolutionHistory::default(),
            epoch: 0,
            stagnation_count: 0,
            total_evaluations: 0,
            cancelled: Arc::new(AtomicBool::new(false)),
            config,
        })
    }

    /// Create an engine over the configured training scenes.
    pub fn from_config(config: EvolutionConfig) -> Result<Self, EvolutionError> {
        let training = &config.training;
        let references = Image::render_scenes(&training.scenes, training.width, training.height);
        Self::new(config, references)
    }

    /// Replace the image scorer.
    pub fn with_fitness_function<F>(mut self, scorer: F) -> Self
    where
        F: FitnessFunction + 'static,
    {
        self.scorer = Box::new(scorer);
        self
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Live speciated population.
    pub fn population(&self) -> &[Species] {
        &self.population
    }

    /// Epochs completed.
    pub fn epoch_count(&self) -> usize {
        self.epoch
    }

    /// Best chromosome of the most recent epoch.
    pub fn best(&self) -> Option<&Chromosome> {
        self.epoch_best.as_ref()
    }

    /// Best chromosome of the whole run.
    pub fn best_ever(&self) -> Option<&Chromosome> {
        self.best_ever.as_ref()
    }

    /// Raw fitness of a chromosome summed over `images`.
    pub fn evaluate_on(&self, chromosome: &Chromosome, images: &[Image]) -> f32 {
        raw_fitness(self.scorer.as_ref(), images, chromosome)
    }

    /// Run one epoch: evaluate, share, capture the best, then breed the
    /// replacement population.
    pub fn epoch(&mut self) -> EpochReport {
        self.innovations.begin_epoch();

        self.evaluate_population();
        share_fitness(&mut self.population);

        let member_count: usize = self.population.iter().map(Species::len).sum();
        let avg_fitness = self
            .population
            .iter()
            .flat_map(|s| &s.members)
            .map(|c| c.raw_fitness)
            .sum::<f32>()
            / member_count.max(1) as f32;

        let best = population_best(&self.population).clone();
        let species_count = self.population.len();

        let next = self.reproduce();
        self.population = next;

        if best.raw_fitness > self.best_fitness {
            self.best_fitness = best.raw_fitness;
            self.best_ever = Some(best.clone());
            self.stagnation_count = 0;
        } else {
            self.stagnation_count += 1;
        }

        self.history.best_fitness.push(best.raw_fitness);
        self.history.avg_fitness.push(avg_fitness);
        self.history.species_count.push(species_count);
        self.last_avg_fitness = avg_fitness;

        let report = EpochReport {
            epoch: self.epoch,
            best_fitness: best.raw_fitness,
            avg_fitness,
            best_gene_count: best.len(),
            species_count,
            population_size: self.population.iter().map(Species::len).sum(),
            innovation_counter: self.innovations.counter(),
        };

        info!(
            "epoch {}: best {:.3} ({} genes), avg {:.3}, {} species",
            report.epoch,
            report.best_fitness,
            report.best_gene_count,
            report.avg_fitness,
            report.species_count
        );

        self.epoch_best = Some(best);
        self.epoch += 1;
        report
    }

    /// Compute raw fitness for every member in parallel.
    fn evaluate_population(&mut self) {
        let scorer = self.scorer.as_ref();
        let references = &self.references;

        let members: Vec<&mut Chromosome> = self
            .population
            .iter_mut()
            .flat_map(|s| s.members.iter_mut())
            .collect();
        self.total_evaluations += (members.len() * references.len()) as u64;

        members.into_par_iter().for_each(|chromosome| {
            chromosome.raw_fitness = raw_fitness(scorer, references, chromosome);
        });
    }

    /// Build the next population: elites first, then roulette offspring.
    fn reproduce(&mut self) -> Vec<Species> {
        let target = self.config.population.size;
        let species_config = &self.config.species;
        let mut next: Vec<Species> = Vec::new();
        let mut count = 0;

        let mut ranked: Vec<&Chromosome> =
            self.population.iter().flat_map(|s| &s.members).collect();
        ranked.sort_by(|a, b| b.raw_fitness.total_cmp(&a.raw_fitness));
        ranked.truncate(self.config.elitism.best);

        'elites: for _ in 0..self.config.elitism.copies {
            for elite in &ranked {
                if count >= target {
                    break 'elites;
                }
                insert_into_population(&mut next, (*elite).clone(), species_config);
                count += 1;
            }
        }
        debug!("{count} elite copies inserted");

        let total: f32 = self
            .population
            .iter()
            .flat_map(|s| &s.members)
            .map(|c| c.fitness.max(0.0))
            .sum();
        if !(total > 0.0) {
            debug!("total shared fitness is zero, selecting the first representative");
        }

        while count < target {
            let parent1 = roulette(&self.population, total, &mut self.rng);
            let parent2 = roulette(&self.population, total, &mut self.rng);
            let mut child =
                self.rng
                    .crossover(parent1, parent2, self.config.reproduction.crossover_rate);
            self.rng.mutate(
                &mut child,
                &self.config.reproduction,
                &self.config.operators,
                &mut self.innovations,
            );
            insert_into_population(&mut next, child, species_config);
            count += 1;
        }

        debug!("{} species after reproduction", next.len());
        next
    }

    /// Get current progress.
    pub fn progress(&self) -> EvolutionProgress {
        EvolutionProgress {
            epoch: self.epoch,
            total_epochs: self.config.population.max_epochs,
            best_fitness: self.best_fitness,
            epoch_best: self
                .epoch_best
                .as_ref()
                .map_or(f32::NEG_INFINITY, |c| c.raw_fitness),
            avg_fitness: self.last_avg_fitness,
            species_sizes: self.population.iter().map(Species::len).collect(),
            stagnation_count: self.stagnation_count,
            history: self.history.clone(),
        }
    }

    /// Check if evolution should stop.
    fn should_stop(&self) -> Option<StopReason> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Some(StopReason::Cancelled);
        }

        if self.epoch >= self.config.population.max_epochs {
            return Some(StopReason::MaxEpochs);
        }

        if let Some(target) = self.config.population.target_fitness
            && self.best_fitness >= target
        {
            return Some(StopReason::TargetReached);
        }

        if let Some(limit) = self.config.population.stagnation_limit
            && self.stagnation_count >= limit
        {
            return Some(StopReason::Stagnation);
        }

        None
    }

    /// Run evolution with progress callback.
    ///
    /// The callback fires after every epoch. Cancellation is observed
    /// between epochs only.
    pub fn run_with_callback<F>(&mut self, mut callback: F) -> EvolutionResult
    where
        F: FnMut(&EvolutionProgress),
    {
        let start_time = Instant::now();

        let stop_reason = loop {
            if let Some(reason) = self.should_stop() {
                break reason;
            }
            self.epoch();
            callback(&self.progress());
        };

        info!("evolution stopped after {} epochs: {stop_reason:?}", self.epoch);

        EvolutionResult {
            best: self.best_ever.clone().unwrap_or_default(),
            stats: EvolutionStats {
                epochs: self.epoch,
                total_evaluations: self.total_evaluations,
                best_fitness: self.best_fitness,
                elapsed_seconds: start_time.elapsed().as_secs_f64(),
                stop_reason,
            },
            history: self.history.clone(),
        }
    }

    /// Run evolution (blocking).
    pub fn run(&mut self) -> EvolutionResult {
        self.run_with_callback(|_| {})
    }
}

fn raw_fitness(scorer: &dyn FitnessFunction, images: &[Image], chromosome: &Chromosome) -> f32 {
    images
        .iter()
        .map(|image| scorer.score(&compose(image, &chromosome.genes)))
        .sum()
}

/// Divide every member's raw fitness by its species size.
fn share_fitness(population: &mut [Species]) {
    for species in population {
        let size = species.len();
        if size == 0 {
            continue;
        }
        for member in &mut species.members {
            member.fitness = member.raw_fitness / size as f32;
        }
    }
}

/// First member with the strictly greatest raw fitness.
fn population_best(population: &[Species]) -> &Chromosome {
    let mut best = population[0].representative();
    for member in population.iter().flat_map(|s| &s.members) {
        if member.raw_fitness > best.raw_fitness {
            best = member;
        }
    }
    best
}

/// Fitness-proportionate selection over shared fitness.
///
/// Negative fitness counts as zero. A zero total, or a point that
/// accumulation never reaches, selects the first species' representative.
fn roulette<'a>(population: &'a [Species], total: f32, rng: &mut GenomeRng) -> &'a Chromosome {
    let fallback = population[0].representative();
    if !(total > 0.0) {
        return fallback;
    }

    let point = rng.next_f32() * total;
    let mut cumulative = 0.0f32;
    for member in population.iter().flat_map(|s| &s.members) {
        cumulative += member.fitness.max(0.0);
        if cumulative >= point {
            return member;
        }
    }

    warn!("roulette selection fell through at {point} of {total}");
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        ElitismConfig, PopulationConfig, ReproductionConfig, Scene, ToneMapKind,
    };

    fn references() -> Vec<Image> {
        Image::render_scenes(&Scene::training_set(), 16, 12)
    }

    fn small_config(size: usize, max_epochs: usize) -> EvolutionConfig {
        EvolutionConfig {
            population: PopulationConfig {
                size,
                max_epochs,
                ..Default::default()
            },
            reproduction: ReproductionConfig {
                add_gene_chance: 0.5,
                ..Default::default()
            },
            random_seed: Some(42),
            ..Default::default()
        }
    }

    fn total_members(engine: &EvolutionEngine) -> usize {
        engine.population().iter().map(Species::len).sum()
    }

    #[test]
    fn test_engine_creation() {
        let engine = EvolutionEngine::new(small_config(10, 5), references()).unwrap();
        assert_eq!(total_members(&engine), 10);
        // Empty chromosomes are all compatible.
        assert_eq!(engine.population().len(), 1);
        assert!(engine.best().is_none());
    }

    #[test]
    fn test_construction_errors() {
        assert!(matches!(
            EvolutionEngine::new(small_config(10, 5), Vec::new()),
            Err(EvolutionError::NoReferenceImages)
        ));

        let images = vec![Image::new(4, 4), Image::new(4, 5)];
        assert!(matches!(
            EvolutionEngine::new(small_config(10, 5), images),
            Err(EvolutionError::MismatchedDimensions { index: 1, .. })
        ));

        assert!(matches!(
            EvolutionEngine::new(small_config(0, 5), references()),
            Err(EvolutionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_same_seed_same_trajectory() {
        let trajectory = || {
            let mut engine = EvolutionEngine::new(small_config(12, 4), references()).unwrap();
            (0..4)
                .map(|_| engine.epoch().best_fitness)
                .collect::<Vec<_>>()
        };
        let a = trajectory();
        let b = trajectory();
        assert_eq!(a.len(), 4);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn test_population_size_conserved() {
        for size in [1, 2, 7, 15] {
            let mut engine = EvolutionEngine::new(small_config(size, 3), references()).unwrap();
            for _ in 0..3 {
                let report = engine.epoch();
                assert_eq!(report.population_size, size);
                assert_eq!(total_members(&engine), size);
                assert!(engine.population().iter().all(|s| !s.is_empty()));
            }
        }
    }

    #[test]
    fn test_elitism_keeps_best_non_decreasing() {
        let mut engine = EvolutionEngine::new(small_config(16, 6), references()).unwrap();
        let bests: Vec<f32> = (0..6).map(|_| engine.epoch().best_fitness).collect();
        for pair in bests.windows(2) {
            assert!(pair[1] >= pair[0], "best fitness regressed: {bests:?}");
        }
    }

    #[test]
    fn test_single_kind_first_epoch() {
        let config = EvolutionConfig {
            population: PopulationConfig {
                size: 10,
                max_epochs: 1,
                ..Default::default()
            },
            reproduction: ReproductionConfig {
                add_gene_chance: 1.0,
                remove_gene_chance: 0.0,
                ..Default::default()
            },
            elitism: ElitismConfig::disabled(),
            operators: vec![ToneMapKind::Drago],
            random_seed: Some(5),
            ..Default::default()
        };
        let reference = Image::from_scene(&Scene::default(), 16, 12);
        let mut engine = EvolutionEngine::new(config, vec![reference]).unwrap();
        let report = engine.epoch();
        assert_eq!(report.innovation_counter, 1);

        let members: Vec<&Chromosome> = engine
            .population()
            .iter()
            .flat_map(|s| &s.members)
            .collect();
        assert_eq!(members.len(), 10);
        let id = members[0].genes[0].innovation;
        for member in members {
            assert_eq!(member.len(), 1);
            assert_eq!(member.genes[0].innovation, id);
            assert_eq!(member.genes[0].tone_map.kind(), ToneMapKind::Drago);
        }
    }

    #[test]
    fn test_best_is_a_snapshot() {
        let mut engine = EvolutionEngine::new(small_config(8, 3), references()).unwrap();
        engine.epoch();
        let best = engine.best().cloned().unwrap();
        let again = engine.evaluate_on(&best, &references());
        assert_eq!(again.to_bits(), best.raw_fitness.to_bits());
    }

    struct Constant;

    impl FitnessFunction for Constant {
        fn score(&self, _image: &Image) -> f32 {
            1.0
        }
    }

    #[test]
    fn test_custom_fitness_function() {
        let images = references();
        let count = images.len() as f32;
        let mut engine = EvolutionEngine::new(small_config(6, 2), images)
            .unwrap()
            .with_fitness_function(Constant);
        let report = engine.epoch();
        assert_eq!(report.best_fitness, count);
        assert_eq!(report.avg_fitness, count);
    }

    #[test]
    fn test_run_to_max_epochs() {
        let mut engine = EvolutionEngine::new(small_config(8, 3), references()).unwrap();
        let mut seen = Vec::new();
        let result = engine.run_with_callback(|progress| seen.push(progress.epoch));
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(result.stats.epochs, 3);
        assert_eq!(result.stats.stop_reason, StopReason::MaxEpochs);
        assert_eq!(result.history.best_fitness.len(), 3);
        assert_eq!(result.stats.total_evaluations, 3 * 8 * 3);
        assert_eq!(result.best.raw_fitness, result.stats.best_fitness);
    }

    #[test]
    fn test_target_and_stagnation() {
        let mut config = small_config(6, 50);
        config.population.target_fitness = Some(-1.0);
        let result = EvolutionEngine::new(config, references()).unwrap().run();
        assert_eq!(result.stats.stop_reason, StopReason::TargetReached);
        assert_eq!(result.stats.epochs, 1);

        // Without structural mutation every image stays black.
        let mut config = small_config(6, 50);
        config.reproduction.add_gene_chance = 0.0;
        config.population.stagnation_limit = Some(2);
        let result = EvolutionEngine::new(config, references()).unwrap().run();
        assert_eq!(result.stats.stop_reason, StopReason::Stagnation);
        assert_eq!(result.stats.epochs, 3);
    }

    #[test]
    fn test_cancellation() {
        let mut engine = EvolutionEngine::new(small_config(5, 100), references()).unwrap();
        let cancel = engine.cancel_handle();

        // Cancel immediately
        cancel.store(true, Ordering::Relaxed);

        let result = engine.run();
        assert_eq!(result.stats.stop_reason, StopReason::Cancelled);
        assert_eq!(result.stats.epochs, 0);
        assert!(result.best.is_empty());
    }

    fn scored(raw_fitness: f32) -> Chromosome {
        Chromosome {
            raw_fitness,
            ..Default::default()
        }
    }

    #[test]
    fn test_share_fitness_divides_by_species_size() {
        let mut population = vec![
            Species {
                members: vec![scored(6.0), scored(1.5), scored(-3.0)],
            },
            Species::new(scored(4.0)),
        ];
        share_fitness(&mut population);

        let shared: Vec<f32> = population[0].members.iter().map(|c| c.fitness).collect();
        assert_eq!(shared, vec![2.0, 0.5, -1.0]);
        assert_eq!(population[1].members[0].fitness, 4.0);
        // Raw fitness is left untouched.
        assert_eq!(population[0].members[0].raw_fitness, 6.0);
    }

    #[test]
    fn test_best_is_chosen_by_raw_fitness() {
        let mut population = vec![
            Species {
                members: vec![scored(1.0), scored(6.0), scored(1.0)],
            },
            Species::new(scored(4.0)),
        ];
        share_fitness(&mut population);

        // Shared, the lone member of the second species leads 4.0 to 2.0.
        assert!(population[1].members[0].fitness > population[0].members[1].fitness);
        let best = population_best(&population);
        assert!(std::ptr::eq(best, &population[0].members[1]));
        assert_eq!(best.raw_fitness, 6.0);
    }

    #[test]
    fn test_best_ties_go_to_the_first_member() {
        let population = vec![
            Species {
                members: vec![scored(0.5), scored(3.0)],
            },
            Species::new(scored(3.0)),
            Species::new(scored(3.0)),
        ];
        let best = population_best(&population);
        assert!(std::ptr::eq(best, &population[0].members[1]));
    }

    #[test]
    fn test_roulette_zero_total_returns_first() {
        let population = vec![
            Species::new(Chromosome {
                raw_fitness: 1.0,
                ..Default::default()
            }),
            Species::new(Chromosome::new()),
        ];
        let mut rng = GenomeRng::new(0);
        let picked = roulette(&population, 0.0, &mut rng);
        assert!(std::ptr::eq(picked, population[0].representative()));
    }

    #[test]
    fn test_roulette_skips_zero_weight() {
        let member = |fitness| Chromosome {
            fitness,
            ..Default::default()
        };
        let population = vec![Species {
            members: vec![member(0.0), member(-3.0), member(2.0)],
        }];
        let mut rng = GenomeRng::new(9);
        for _ in 0..20 {
            let picked = roulette(&population, 2.0, &mut rng);
            // Draws in (0, 2) land on the third member; a draw of exactly 0 on the first.
            assert!(picked.fitness == 2.0 || picked.fitness == 0.0);
        }
    }
}
