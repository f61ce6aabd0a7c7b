use crate::classifier::{Classifier, ClassifierFactory};
use crate::data::Data;
use crate::error::{GeneticError, Result};
use crate::utils::compute_auc_from_value;
use log::debug;
use std::sync::Arc;

/// Output of one ensemble member on the test partition
#[derive(Clone, Debug)]
pub struct ClassifierResult {
    pub name: String,
    pub labels: Vec<u8>,
    pub distributions: Vec<Vec<f64>>,
    /// standalone AUC of the class-1 probability, on a 0-100 scale
    pub auc: f64,
}

/// Fixed, ordered set of classifiers trained and scored together on one train/test pair
pub struct ClassifierEnsemble {
    members: Vec<Box<dyn Classifier>>,
    results: Vec<ClassifierResult>,
    truth: Vec<u8>,
}

impl ClassifierEnsemble {
    pub fn new(factories: &[Arc<dyn ClassifierFactory>]) -> ClassifierEnsemble {
        ClassifierEnsemble {
            members: factories.iter().map(|f| f.create()).collect(),
            results: Vec::new(),
            truth: Vec::new(),
        }
    }

    pub fn from_members(members: Vec<Box<dyn Classifier>>) -> ClassifierEnsemble {
        ClassifierEnsemble { members, results: Vec::new(), truth: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn results(&self) -> &[ClassifierResult] {
        &self.results
    }

    /// Fits every member on `train`, predicts every `test` instance and computes each member's AUC
    pub fn score(&mut self, train: &Data, test: &Data) -> Result<&[ClassifierResult]> {
        self.results.clear();
        self.truth = test.y.clone();

        for member in self.members.iter_mut() {
            member.fit(train)?;

            let mut labels = Vec::with_capacity(test.sample_len);
            let mut distributions = Vec::with_capacity(test.sample_len);
            for instance in test.X.iter() {
                let distribution = member.predict_distribution(instance)?;
                if distribution.iter().any(|p| !p.is_finite()) {
                    return Err(GeneticError::training(
                        &member.name(),
                        format!("non-finite class distribution {:?}", distribution),
                    ));
                }
                labels.push(member.predict_label(instance)?);
                distributions.push(distribution);
            }

            let positive: Vec<f64> = distributions.iter().map(|d| d.get(1).copied().unwrap_or(0.0)).collect();
            let auc = compute_auc_from_value(&positive, &test.y) * 100.0;
            debug!("{}: AUC {:.4}", member.name(), auc);

            self.results.push(ClassifierResult { name: member.name(), labels, distributions, auc });
        }

        Ok(&self.results)
    }

    /// mean of the members' AUCs
    pub fn blocking(&self) -> Result<f64> {
        if self.results.is_empty() {
            return Err(GeneticError::InvalidParam("blocking requires at least one scored classifier".to_string()));
        }
        Ok(self.results.iter().map(|r| r.auc).sum::<f64>() / self.results.len() as f64)
    }

    /// AUC (0-100) of the members' averaged probability for `class_index`
    pub fn voting(&self, class_index: usize) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        let n = self.results.len() as f64;
        let averaged: Vec<f64> = (0..self.truth.len())
            .map(|k| {
                self.results
                    .iter()
                    .map(|r| r.distributions[k].get(class_index).copied().unwrap_or(0.0))
                    .sum::<f64>()
                    / n
            })
            .collect();
        let positives: Vec<u8> = self.truth.iter().map(|&c| u8::from(c as usize == class_index)).collect();
        compute_auc_from_value(&averaged, &positives) * 100.0
    }

    fn pairs(&self) -> impl Iterator<Item = (&ClassifierResult, &ClassifierResult)> + '_ {
        self.results
            .iter()
            .enumerate()
            .flat_map(move |(i, a)| self.results[i + 1..].iter().map(move |b| (a, b)))
    }

    /// Pairwise Cohen's kappa turned into a disagreement score, averaged and scaled to 0-100
    pub fn kappa_diversity(&self) -> f64 {
        let n = self.truth.len();
        let members = self.results.len();
        if members < 2 || n == 0 {
            return 0.0;
        }

        let mut total = 0.0;
        for (a, b) in self.pairs() {
            let agree = a.labels.iter().zip(b.labels.iter()).filter(|(x, y)| x == y).count();
            let phi1 = agree as f64 / n as f64;

            let phi2: f64 = (0..2u8)
                .map(|c| {
                    let rate_a = a.labels.iter().filter(|&&l| l == c).count() as f64 / n as f64;
                    let rate_b = b.labels.iter().filter(|&&l| l == c).count() as f64 / n as f64;
                    rate_a * rate_b
                })
                .sum();

            // both constant on the same label: complete agreement
            let kappa = if (1.0 - phi2).abs() < 1e-12 { 1.0 } else { (phi1 - phi2) / (1.0 - phi2) };
            total += (1.0 - kappa) / 2.0;
        }

        let pair_count = (members * (members - 1) / 2) as f64;
        100.0 * total / pair_count
    }

    /// 100 when no two members ever fail on the same instance
    pub fn double_fault_diversity(&self) -> f64 {
        let n = self.truth.len();
        let members = self.results.len();
        if members < 2 || n == 0 {
            return 0.0;
        }

        let mut rate_sum = 0.0;
        for (a, b) in self.pairs() {
            let both_wrong = (0..n)
                .filter(|&k| a.labels[k] == b.labels[k] && a.labels[k] != self.truth[k])
                .count();
            rate_sum += both_wrong as f64 / n as f64;
        }

        100.0 * (1.0 - 2.0 * rate_sum / (members * (members - 1)) as f64)
    }
}
