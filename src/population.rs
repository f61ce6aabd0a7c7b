use crate::chromosome::Chromosome;
use crate::utils::mean_and_std;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::mem;

/// Chromosomes of one generation, their fitness, and the staging buffer filled by selection
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Population {
    pub chromosomes: Vec<Chromosome>,
    pub fitness: Vec<f64>,
    pub favored: Vec<Chromosome>,
}

impl Population {
    pub fn new() -> Population {
        Population { chromosomes: Vec::new(), fitness: Vec::new(), favored: Vec::new() }
    }

    /// random initial generation
    pub fn generate(population_size: usize, chromosome_length: usize, feature_len: usize, rng: &mut ChaCha8Rng) -> Population {
        let chromosomes: Vec<Chromosome> = (0..population_size)
            .map(|_| Chromosome::random(chromosome_length, feature_len, rng))
            .collect();
        Population {
            fitness: vec![0.0; population_size],
            favored: chromosomes.clone(),
            chromosomes,
        }
    }

    pub fn len(&self) -> usize {
        self.chromosomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chromosomes.is_empty()
    }

    /// Ordering where `Less` means chromosome `a` ranks before `b`: higher fitness first,
    /// then fewer active features
    pub fn compare(&self, a: usize, b: usize) -> Ordering {
        self.fitness[b]
            .total_cmp(&self.fitness[a])
            .then_with(|| self.chromosomes[a].active_len().cmp(&self.chromosomes[b].active_len()))
    }

    /// Indices of the `n` best chromosomes, best first. Remaining ties go to the lowest index.
    pub fn elite_roster(&self, n: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.len()).collect();
        // stable sort keeps index order among equals
        indices.sort_by(|&a, &b| self.compare(a, b));
        indices.truncate(n);
        indices
    }

    /// index of the best chromosome
    pub fn best(&self) -> Option<usize> {
        self.elite_roster(1).first().copied()
    }

    pub fn average_fitness(&self) -> (f64, f64) {
        mean_and_std(&self.fitness)
    }

    /// Swaps the staging buffer into the live generation and clears fitness
    pub fn advance(&mut self) {
        mem::swap(&mut self.chromosomes, &mut self.favored);
        self.favored = self.chromosomes.clone();
        self.fitness.iter_mut().for_each(|f| *f = 0.0);
    }

    /// chromosome/fitness table, one line per chromosome
    pub fn display(&self) -> String {
        let mut text = String::new();
        for (i, (chromosome, fitness)) in self.chromosomes.iter().zip(self.fitness.iter()).enumerate() {
            text.push_str(&format!("#{:<4} {:>8.4}  {}\n", i, fitness, chromosome));
        }
        text
    }
}

impl fmt::Debug for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Population")
            .field("chromosomes", &self.chromosomes)
            .field("fitness", &self.fitness)
            .finish()
    }
}
