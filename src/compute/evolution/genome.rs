//! Genome representation and variation operators.
//!
//! A chromosome is an ordered list of genes, each a weighted tone-map
//! operator tagged with an innovation id. Genes of the same kind that appear
//! within one epoch share an id, which is what lets crossover and the
//! compatibility distance line up homologous genes.

use std::collections::HashMap;

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::compute::image::lerp;
use crate::compute::tonemap::ToneMap;
use crate::schema::{ReproductionConfig, ToneMapKind};

/// A weighted tone-map operator with its historical marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gene {
    pub tone_map: ToneMap,
    pub innovation: u32,
}

/// An ordered gene list with its fitness values.
///
/// `raw_fitness` is the summed score over the reference images and is what
/// gets reported. `fitness` is the species-shared value used for selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chromosome {
    pub genes: Vec<Gene>,
    pub fitness: f32,
    pub raw_fitness: f32,
}

impl Chromosome {
    /// Create an empty chromosome.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Largest innovation id carried, `None` when empty.
    pub fn max_innovation(&self) -> Option<u32> {
        self.genes.iter().map(|g| g.innovation).max()
    }

    /// Gene carrying the given innovation id.
    pub fn gene(&self, innovation: u32) -> Option<&Gene> {
        self.genes.iter().find(|g| g.innovation == innovation)
    }
}

/// Innovation id bookkeeping.
///
/// The counter is monotone for the whole run; the kind-to-id map only lives
/// for one epoch, so the same kind introduced in a later epoch gets a new id.
#[derive(Debug, Clone, Default)]
pub struct InnovationTable {
    next: u32,
    epoch: HashMap<ToneMapKind, u32>,
}

impl InnovationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id that will be issued.
    pub fn counter(&self) -> u32 {
        self.next
    }

    /// Forget this epoch's kind assignments.
    pub fn begin_epoch(&mut self) {
        self.epoch.clear();
    }

    /// Id for a structural addition of `kind` in the current epoch.
    pub fn innovation_for(&mut self, kind: ToneMapKind) -> u32 {
        *self.epoch.entry(kind).or_insert_with(|| {
            let id = self.next;
            self.next += 1;
            id
        })
    }
}

/// Random number generator wrapper for genome operations.
///
/// Every stochastic decision of a run draws from this single stream in a
/// fixed order, so a seed fully determines the run.
pub struct GenomeRng {
    rng: StdRng,
}

impl GenomeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform draw in `[0, 1)`.
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        self.rng.r#gen::<f32>()
    }

    /// Uniformly random kind from the enabled set.
    pub fn random_kind(&mut self, operators: &[ToneMapKind]) -> Option<ToneMapKind> {
        operators.choose(&mut self.rng).copied()
    }

    /// Recombine two parents.
    ///
    /// The child starts as a copy of the fitter parent (by shared fitness,
    /// ties going to `parent2`). Each of its genes whose innovation id also
    /// occurs in the other parent is swapped for that parent's gene with
    /// probability `crossover_rate`.
    pub fn crossover(
        &mut self,
        parent1: &Chromosome,
        parent2: &Chromosome,
        crossover_rate: f32,
    ) -> Chromosome {
        let (best, worst) = if parent1.fitness > parent2.fitness {
            (parent1, parent2)
        } else {
            (parent2, parent1)
        };

        let mut child = Chromosome::new();
        child.genes.reserve(best.len());
        for gene in &best.genes {
            let inherited = match worst.gene(gene.innovation) {
                Some(other) if self.next_f32() < crossover_rate => other.clone(),
                _ => gene.clone(),
            };
            child.genes.push(inherited);
        }
        child
    }

    /// Structural then parametric mutation.
    ///
    /// Draw order: add-gene, remove-gene, then for each gene every parameter
    /// followed by its weight.
    pub fn mutate(
        &mut self,
        chromosome: &mut Chromosome,
        config: &ReproductionConfig,
        operators: &[ToneMapKind],
        innovations: &mut InnovationTable,
    ) {
        if self.next_f32() < config.add_gene_chance {
            self.add_gene(chromosome, operators, innovations, config.weight_mutation);
        }
        if self.next_f32() < config.remove_gene_chance {
            self.remove_gene(chromosome);
        }

        let strength = config.weight_mutation;
        for gene in &mut chromosome.genes {
            let tone_map = &mut gene.tone_map;
            for i in 0..tone_map.parameter_count() {
                let (min, max) = tone_map.parameter_range(i);
                let delta = (2.0 * self.next_f32() - 1.0) * strength * (max - min);
                let value = (tone_map.parameter(i) + delta).clamp(min, max);
                tone_map.set_parameter(i, value);
            }
            let delta = (2.0 * self.next_f32() - 1.0) * strength;
            tone_map.weight = (tone_map.weight + delta).clamp(0.0, 1.0);
        }
    }

    /// Append a gene of a random enabled kind with uniformly drawn parameters.
    pub fn add_gene(
        &mut self,
        chromosome: &mut Chromosome,
        operators: &[ToneMapKind],
        innovations: &mut InnovationTable,
        initial_weight: f32,
    ) {
        let Some(kind) = self.random_kind(operators) else {
            return;
        };

        let mut tone_map = ToneMap::new(kind);
        for i in 0..tone_map.parameter_count() {
            let (min, max) = tone_map.parameter_range(i);
            tone_map.set_parameter(i, lerp(min, max, self.next_f32()));
        }
        tone_map.weight = initial_weight;

        let innovation = innovations.innovation_for(kind);
        chromosome.genes.push(Gene {
            tone_map,
            innovation,
        });
    }

    /// Remove a uniformly random gene. Consumes no randomness when empty.
    pub fn remove_gene(&mut self, chromosome: &mut Chromosome) {
        if chromosome.genes.is_empty() {
            return;
        }
        let index = self.rng.gen_range(0..chromosome.genes.len());
        chromosome.genes.remove(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const KINDS: [ToneMapKind; 4] = [
        ToneMapKind::Reinhard,
        ToneMapKind::TumblinRushmeier,
        ToneMapKind::Drago,
        ToneMapKind::Mantiuk,
    ];

    fn gene(kind: ToneMapKind, innovation: u32, weight: f32) -> Gene {
        let mut tone_map = ToneMap::new(kind);
        tone_map.weight = weight;
        Gene {
            tone_map,
            innovation,
        }
    }

    fn chromosome(genes: Vec<Gene>, fitness: f32) -> Chromosome {
        Chromosome {
            genes,
            fitness,
            raw_fitness: fitness,
        }
    }

    #[test]
    fn test_innovation_reused_within_epoch() {
        let mut table = InnovationTable::new();
        let a = table.innovation_for(ToneMapKind::Drago);
        let b = table.innovation_for(ToneMapKind::Reinhard);
        let c = table.innovation_for(ToneMapKind::Drago);
        assert_eq!((a, b, c), (0, 1, 0));
        assert_eq!(table.counter(), 2);

        table.begin_epoch();
        assert_eq!(table.innovation_for(ToneMapKind::Drago), 2);
        assert_eq!(table.counter(), 3);
    }

    #[test]
    fn test_add_gene_within_ranges() {
        let mut rng = GenomeRng::new(7);
        let mut table = InnovationTable::new();
        let mut c = Chromosome::new();
        for _ in 0..20 {
            rng.add_gene(&mut c, &KINDS, &mut table, 0.1);
        }
        assert_eq!(c.len(), 20);
        for g in &c.genes {
            assert!(KINDS.contains(&g.tone_map.kind()));
            assert_eq!(g.tone_map.weight, 0.1);
            for i in 0..g.tone_map.parameter_count() {
                let (min, max) = g.tone_map.parameter_range(i);
                let v = g.tone_map.parameter(i);
                assert!(v >= min && v <= max);
            }
        }
        // Same kind in the same epoch, same id.
        for a in &c.genes {
            for b in &c.genes {
                if a.tone_map.kind() == b.tone_map.kind() {
                    assert_eq!(a.innovation, b.innovation);
                }
            }
        }
    }

    #[test]
    fn test_add_gene_without_operators_is_noop() {
        let mut rng = GenomeRng::new(1);
        let mut table = InnovationTable::new();
        let mut c = Chromosome::new();
        rng.add_gene(&mut c, &[], &mut table, 0.1);
        assert!(c.is_empty());
        assert_eq!(table.counter(), 0);
    }

    #[test]
    fn test_remove_gene_on_empty() {
        let mut rng = GenomeRng::new(1);
        let mut c = Chromosome::new();
        rng.remove_gene(&mut c);
        assert!(c.is_empty());

        let mut c = chromosome(vec![gene(ToneMapKind::Drago, 0, 1.0)], 0.0);
        rng.remove_gene(&mut c);
        assert!(c.is_empty());
    }

    #[test]
    fn test_crossover_follows_fitter_parent() {
        let p1 = chromosome(
            vec![
                gene(ToneMapKind::Reinhard, 0, 0.2),
                gene(ToneMapKind::Drago, 1, 0.2),
            ],
            5.0,
        );
        let p2 = chromosome(
            vec![
                gene(ToneMapKind::Reinhard, 0, 0.9),
                gene(ToneMapKind::Drago, 1, 0.9),
                gene(ToneMapKind::Mantiuk, 2, 0.9),
            ],
            1.0,
        );

        let mut rng = GenomeRng::new(3);
        let child = rng.crossover(&p1, &p2, 0.0);
        assert_eq!(child.genes, p1.genes);
        assert_eq!(child.fitness, 0.0);

        // Rate 1 swaps every homologous gene.
        let child = rng.crossover(&p1, &p2, 1.0);
        let ids: Vec<u32> = child.genes.iter().map(|g| g.innovation).collect();
        assert_eq!(ids, vec![0, 1]);
        assert!(child.genes.iter().all(|g| g.tone_map.weight == 0.9));
    }

    #[test]
    fn test_crossover_tie_takes_second_parent() {
        let p1 = chromosome(vec![gene(ToneMapKind::Reinhard, 0, 1.0)], 2.0);
        let p2 = chromosome(vec![gene(ToneMapKind::Drago, 5, 1.0)], 2.0);
        let child = GenomeRng::new(0).crossover(&p1, &p2, 0.5);
        assert_eq!(child.genes, p2.genes);
    }

    #[test]
    fn test_same_seed_same_mutation() {
        let config = ReproductionConfig {
            add_gene_chance: 0.5,
            remove_gene_chance: 0.2,
            ..Default::default()
        };
        let run = |seed| {
            let mut rng = GenomeRng::new(seed);
            let mut table = InnovationTable::new();
            let mut c = Chromosome::new();
            for _ in 0..30 {
                rng.mutate(&mut c, &config, &KINDS, &mut table);
            }
            c
        };
        assert_eq!(run(11), run(11));
    }

    proptest! {
        #[test]
        fn prop_crossover_length_matches_fitter_parent(
            n1 in 0usize..6,
            n2 in 0usize..6,
            f1 in -5.0f32..5.0,
            f2 in -5.0f32..5.0,
            seed in any::<u64>(),
        ) {
            let p1 = chromosome(
                (0..n1).map(|i| gene(ToneMapKind::Reinhard, i as u32, 0.5)).collect(),
                f1,
            );
            let p2 = chromosome(
                (0..n2).map(|i| gene(ToneMapKind::Drago, i as u32 * 2, 0.5)).collect(),
                f2,
            );
            let child = GenomeRng::new(seed).crossover(&p1, &p2, 0.5);
            let expected = if f1 > f2 { n1 } else { n2 };
            prop_assert_eq!(child.len(), expected);
            prop_assert!(child.len() <= n1.max(n2));
        }

        #[test]
        fn prop_mutation_stays_in_range(
            seed in any::<u64>(),
            strength in 0.0f32..5.0,
            rounds in 1usize..10,
        ) {
            let config = ReproductionConfig {
                add_gene_chance: 0.7,
                remove_gene_chance: 0.1,
                weight_mutation: strength,
                ..Default::default()
            };
            let mut rng = GenomeRng::new(seed);
            let mut table = InnovationTable::new();
            let mut c = chromosome(
                ToneMapKind::ALL.iter().enumerate().map(|(i, &k)| gene(k, i as u32, 0.5)).collect(),
                0.0,
            );
            for _ in 0..rounds {
                rng.mutate(&mut c, &config, &ToneMapKind::ALL, &mut table);
            }
            for g in &c.genes {
                prop_assert!((0.0..=1.0).contains(&g.tone_map.weight));
                for i in 0..g.tone_map.parameter_count() {
                    let (min, max) = g.tone_map.parameter_range(i);
                    let v = g.tone_map.parameter(i);
                    prop_assert!(v >= min && v <= max);
                }
            }
        }
    }
}
