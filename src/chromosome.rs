use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Candidate feature subset: a fixed number of slots, each empty or holding one feature index.
/// A feature index never appears twice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chromosome {
    pub slots: Vec<Option<usize>>,
}

impl Chromosome {
    pub fn empty(length: usize) -> Chromosome {
        Chromosome { slots: vec![None; length] }
    }

    /// Each slot is left empty with probability 1/2, otherwise filled with a feature not yet present
    pub fn random(length: usize, feature_len: usize, rng: &mut ChaCha8Rng) -> Chromosome {
        let mut chromosome = Chromosome::empty(length);
        for slot in 0..length {
            if rng.gen_bool(0.5) {
                continue;
            }
            if let Some(feature) = chromosome.draw_absent_feature(feature_len, rng) {
                chromosome.slots[slot] = Some(feature);
            }
        }
        chromosome
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn active_len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.active_len() == 0
    }

    /// active features in slot order
    pub fn features(&self) -> Vec<usize> {
        self.slots.iter().flatten().copied().collect()
    }

    pub fn contains(&self, feature: usize) -> bool {
        self.slots.contains(&Some(feature))
    }

    /// Uniform draw among features not present, None when every feature is already used
    pub fn draw_absent_feature(&self, feature_len: usize, rng: &mut ChaCha8Rng) -> Option<usize> {
        let active = self.active_len();
        if active >= feature_len {
            return None;
        }
        // rejection sampling is fine while the chromosome is sparse
        if active * 2 < feature_len {
            loop {
                let feature = rng.gen_range(0..feature_len);
                if !self.contains(feature) {
                    return Some(feature);
                }
            }
        }
        let absent: Vec<usize> = (0..feature_len).filter(|&f| !self.contains(f)).collect();
        Some(absent[rng.gen_range(0..absent.len())])
    }

    pub fn has_duplicates(&self) -> bool {
        let features = self.features();
        features.iter().enumerate().any(|(i, f)| features[i + 1..].contains(f))
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<String> = self
            .slots
            .iter()
            .map(|s| match s {
                Some(feature) => feature.to_string(),
                None => "-".to_string(),
            })
            .collect();
        write!(f, "{}", cells.join("\t"))
    }
}
