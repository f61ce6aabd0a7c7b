use crate::data::Data;
use crate::error::{GeneticError, Result};
use crate::utils;
use log::debug;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

/// One train/test split of the dataset
#[derive(Clone, Debug)]
pub struct Fold {
    pub index: usize,
    pub train: Data,
    pub test: Data,
}

/// Stratified k-fold rotation: each call reshuffles the whole dataset per class,
/// cuts it into `folds` parts and hands out the next fold index.
#[derive(Debug)]
pub struct FoldRotator {
    pub folds: usize,
    pub index: usize,
}

impl FoldRotator {
    pub fn new(folds: usize) -> FoldRotator {
        FoldRotator { folds, index: 0 }
    }

    /// Checks that every fold can hold at least one sample of each class
    pub fn check(&self, data: &Data) -> Result<()> {
        if self.folds < 2 {
            return Err(GeneticError::DegenerateFold {
                fold: self.index,
                reason: format!("{} folds requested, at least 2 are needed", self.folds),
            });
        }
        if data.sample_len < self.folds {
            return Err(GeneticError::DegenerateFold {
                fold: self.index,
                reason: format!("{} samples cannot fill {} folds", data.sample_len, self.folds),
            });
        }
        let (n0, n1) = data.class_counts();
        if n0 < self.folds || n1 < self.folds {
            return Err(GeneticError::DegenerateFold {
                fold: self.index,
                reason: format!(
                    "class sizes {}/{} are too small to place both classes in each of {} folds",
                    n0, n1, self.folds
                ),
            });
        }
        Ok(())
    }

    /// Draws a freshly stratified split and returns the fold at the current index, then
    /// moves the index forward (wrapping around). On failure the index does not move.
    pub fn rotate(&mut self, data: &Data, rng: &mut ChaCha8Rng) -> Result<Arc<Fold>> {
        self.check(data)?;

        let mut indices_class0: Vec<usize> = Vec::new();
        let mut indices_class1: Vec<usize> = Vec::new();
        for (i, class) in data.y.iter().enumerate() {
            if *class == 0 { indices_class0.push(i) } else { indices_class1.push(i) }
        }

        let chunks0 = utils::split_into_balanced_random_chunks(indices_class0, self.folds, rng);
        let chunks1 = utils::split_into_balanced_random_chunks(indices_class1, self.folds, rng);

        let mut train_indices = Vec::with_capacity(data.sample_len);
        let mut test_indices = Vec::new();
        for (i, (c0, c1)) in chunks0.into_iter().zip(chunks1).enumerate() {
            if i == self.index {
                test_indices.extend(c0.into_iter().chain(c1));
            } else {
                train_indices.extend(c0.into_iter().chain(c1));
            }
        }

        let fold = Arc::new(Fold {
            index: self.index,
            train: data.subset(train_indices),
            test: data.subset(test_indices),
        });
        debug!(
            "Fold #{}: {} train samples, {} test samples",
            fold.index + 1,
            fold.train.sample_len,
            fold.test.sample_len
        );

        self.index = (self.index + 1) % self.folds;
        Ok(fold)
    }
}
