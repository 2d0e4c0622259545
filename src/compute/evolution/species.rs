//! Speciation by compatibility distance.

use log::debug;
use serde::{Deserialize, Serialize};

use super::genome::Chromosome;
use crate::compute::tonemap::ToneMap;
use crate::schema::SpeciesConfig;

/// A cluster of mutually compatible chromosomes.
///
/// The first member is the representative new chromosomes are compared
/// against. A species is created with one member and never emptied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub members: Vec<Chromosome>,
}

impl Species {
    /// Create a species with `founder` as its representative.
    pub fn new(founder: Chromosome) -> Self {
        Self {
            members: vec![founder],
        }
    }

    /// Comparison anchor for insertion.
    #[inline]
    pub fn representative(&self) -> &Chromosome {
        &self.members[0]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Compatibility distance between two chromosomes.
///
/// Genes present in only one chromosome are excess when their innovation id
/// exceeds the other's largest id (every gene is excess against an empty
/// chromosome) and disjoint otherwise. Homologous genes contribute their
/// weight difference plus the absolute differences of their range-normalized
/// parameters.
///
/// `distance = excess * c1 / n + disjoint * c2 / n + c3 * w`
pub fn compatibility_distance(a: &Chromosome, b: &Chromosome, config: &SpeciesConfig) -> f32 {
    let mut excess = 0usize;
    let mut disjoint = 0usize;
    let mut shared = Vec::new();

    let max_b = b.max_innovation();
    for gene in &a.genes {
        match b.gene(gene.innovation) {
            Some(other) => {
                shared.push((gene.innovation, gene_difference(&gene.tone_map, &other.tone_map)))
            }
            None if max_b.is_none_or(|max| gene.innovation > max) => excess += 1,
            None => disjoint += 1,
        }
    }

    // Summed by innovation id so the result is bitwise symmetric.
    shared.sort_unstable_by_key(|&(innovation, _)| innovation);
    let weight_difference: f32 = shared.iter().map(|&(_, diff)| diff).sum();

    let max_a = a.max_innovation();
    for gene in &b.genes {
        if a.gene(gene.innovation).is_some() {
            continue;
        }
        if max_a.is_none_or(|max| gene.innovation > max) {
            excess += 1;
        } else {
            disjoint += 1;
        }
    }

    excess as f32 * config.c1 / config.n
        + disjoint as f32 * config.c2 / config.n
        + config.c3 * weight_difference
}

/// Weight plus normalized parameter differences of two homologous genes.
fn gene_difference(a: &ToneMap, b: &ToneMap) -> f32 {
    let params = a.parameter_count().min(b.parameter_count());
    let mut diff = (a.weight - b.weight).abs();
    for i in 0..params {
        diff += (a.normalized_parameter(i) - b.normalized_parameter(i)).abs();
    }
    diff
}

/// Place a chromosome into the first species whose representative lies
/// within `threshold`, or found a new species.
///
/// Returns the index of the receiving species.
pub fn insert_into_population(
    population: &mut Vec<Species>,
    chromosome: Chromosome,
    config: &SpeciesConfig,
) -> usize {
    let found = population.iter().position(|species| {
        compatibility_distance(species.representative(), &chromosome, config) <= config.threshold
    });

    match found {
        Some(index) => {
            population[index].members.push(chromosome);
            index
        }
        None => {
            population.push(Species::new(chromosome));
            debug!("new species #{}", population.len() - 1);
            population.len() - 1
        }
    }
}
