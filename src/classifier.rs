use crate::data::Data;
use crate::error::{GeneticError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A learner usable as an ensemble member.
///
/// `predict_label` and `predict_distribution` fail until `fit` succeeded.
/// Distributions are `[P(class 0), P(class 1)]`.
pub trait Classifier: Send {
    fn name(&self) -> String;

    fn fit(&mut self, train: &Data) -> Result<()>;

    fn predict_distribution(&self, instance: &[u8]) -> Result<Vec<f64>>;

    /// most probable class, class 0 on ties
    fn predict_label(&self, instance: &[u8]) -> Result<u8> {
        let distribution = self.predict_distribution(instance)?;
        Ok(if distribution.get(1).copied().unwrap_or(0.0) > distribution.first().copied().unwrap_or(0.0) { 1 } else { 0 })
    }
}

/// Creates a fresh, untrained classifier for every fitness evaluation
pub trait ClassifierFactory: Send + Sync {
    fn name(&self) -> String;
    fn create(&self) -> Box<dyn Classifier>;
}

impl<F> ClassifierFactory for F
where
    F: Fn() -> Box<dyn Classifier> + Send + Sync,
{
    fn name(&self) -> String {
        self().name()
    }

    fn create(&self) -> Box<dyn Classifier> {
        self()
    }
}

/// Built-in learners that can be listed in the parameter file
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ClassifierKind {
    DecisionTree,
    NaiveBayes,
    NearestNeighbours { k: usize },
    MajorityClass,
}

impl ClassifierFactory for ClassifierKind {
    fn name(&self) -> String {
        self.create().name()
    }

    fn create(&self) -> Box<dyn Classifier> {
        match self {
            ClassifierKind::DecisionTree => Box::new(DecisionTree::new()),
            ClassifierKind::NaiveBayes => Box::new(NaiveBayes::new()),
            ClassifierKind::NearestNeighbours { k } => Box::new(NearestNeighbours::new(*k)),
            ClassifierKind::MajorityClass => Box::new(MajorityClass::new()),
        }
    }
}

fn not_fitted(name: &str) -> GeneticError {
    GeneticError::training(name, "used before fit")
}

fn require_samples(name: &str, train: &Data) -> Result<()> {
    if train.sample_len == 0 {
        return Err(GeneticError::training(name, "empty training partition"));
    }
    Ok(())
}

fn frequencies(counts: [usize; 2]) -> Vec<f64> {
    let total = (counts[0] + counts[1]) as f64;
    if total == 0.0 {
        return vec![0.5, 0.5];
    }
    vec![counts[0] as f64 / total, counts[1] as f64 / total]
}

fn class_counts(y: &[u8], rows: &[usize]) -> [usize; 2] {
    let mut counts = [0, 0];
    for &i in rows {
        counts[y[i] as usize] += 1;
    }
    counts
}

//-----------------------------------------------------------------------------
// Majority class
//-----------------------------------------------------------------------------

/// Always answers with the class frequencies of its training partition
#[derive(Clone, Debug, Default)]
pub struct MajorityClass {
    distribution: Option<Vec<f64>>,
}

impl MajorityClass {
    pub fn new() -> MajorityClass {
        MajorityClass { distribution: None }
    }
}

impl Classifier for MajorityClass {
    fn name(&self) -> String {
        "MajorityClass".to_string()
    }

    fn fit(&mut self, train: &Data) -> Result<()> {
        require_samples(&self.name(), train)?;
        let (n0, n1) = train.class_counts();
        self.distribution = Some(frequencies([n0, n1]));
        Ok(())
    }

    fn predict_distribution(&self, _instance: &[u8]) -> Result<Vec<f64>> {
        self.distribution.clone().ok_or_else(|| not_fitted(&self.name()))
    }
}

//-----------------------------------------------------------------------------
// Naive Bayes
//-----------------------------------------------------------------------------

/// Categorical naive Bayes with Laplace smoothing
#[derive(Clone, Debug, Default)]
pub struct NaiveBayes {
    class_counts: [usize; 2],
    // value_counts[j][class][code]
    value_counts: Vec<[Vec<usize>; 2]>,
    fitted: bool,
}

impl NaiveBayes {
    pub fn new() -> NaiveBayes {
        NaiveBayes::default()
    }
}

impl Classifier for NaiveBayes {
    fn name(&self) -> String {
        "NaiveBayes".to_string()
    }

    fn fit(&mut self, train: &Data) -> Result<()> {
        require_samples(&self.name(), train)?;
        let (n0, n1) = train.class_counts();
        self.class_counts = [n0, n1];

        self.value_counts = (0..train.feature_len)
            .map(|j| {
                let n_levels = train.levels.get(j).map_or(0, |l| l.len()).max(1);
                [vec![0; n_levels], vec![0; n_levels]]
            })
            .collect();
        for (row, &class) in train.X.iter().zip(train.y.iter()) {
            for (j, &code) in row.iter().enumerate() {
                let counts = &mut self.value_counts[j][class as usize];
                if code as usize >= counts.len() {
                    counts.resize(code as usize + 1, 0);
                }
                counts[code as usize] += 1;
            }
        }

        self.fitted = true;
        Ok(())
    }

    fn predict_distribution(&self, instance: &[u8]) -> Result<Vec<f64>> {
        if !self.fitted {
            return Err(not_fitted(&self.name()));
        }
        if instance.len() != self.value_counts.len() {
            return Err(GeneticError::training(
                &self.name(),
                format!("instance has {} features, {} expected", instance.len(), self.value_counts.len()),
            ));
        }

        let total = (self.class_counts[0] + self.class_counts[1]) as f64;
        let mut log_scores = [0.0f64; 2];
        for class in 0..2 {
            let n_class = self.class_counts[class] as f64;
            let mut score = ((n_class + 1.0) / (total + 2.0)).ln();
            for (j, &code) in instance.iter().enumerate() {
                let counts = &self.value_counts[j][class];
                let n_levels = counts.len().max(code as usize + 1) as f64;
                let count = counts.get(code as usize).copied().unwrap_or(0) as f64;
                score += ((count + 1.0) / (n_class + n_levels)).ln();
            }
            log_scores[class] = score;
        }

        let max = log_scores[0].max(log_scores[1]);
        let p0 = (log_scores[0] - max).exp();
        let p1 = (log_scores[1] - max).exp();
        Ok(vec![p0 / (p0 + p1), p1 / (p0 + p1)])
    }
}

//-----------------------------------------------------------------------------
// Nearest neighbours
//-----------------------------------------------------------------------------

/// k nearest neighbours with overlap distance (number of differing features) and an unweighted vote.
/// Equidistant neighbours are taken in training order.
#[derive(Clone, Debug)]
pub struct NearestNeighbours {
    k: usize,
    X: Vec<Vec<u8>>,
    y: Vec<u8>,
    fitted: bool,
}

impl NearestNeighbours {
    pub fn new(k: usize) -> NearestNeighbours {
        NearestNeighbours { k: k.max(1), X: Vec::new(), y: Vec::new(), fitted: false }
    }
}

impl Classifier for NearestNeighbours {
    fn name(&self) -> String {
        format!("NearestNeighbours(k={})", self.k)
    }

    fn fit(&mut self, train: &Data) -> Result<()> {
        require_samples(&self.name(), train)?;
        self.X = train.X.clone();
        self.y = train.y.clone();
        self.fitted = true;
        Ok(())
    }

    fn predict_distribution(&self, instance: &[u8]) -> Result<Vec<f64>> {
        if !self.fitted {
            return Err(not_fitted(&self.name()));
        }

        let mut distances: Vec<(usize, usize)> = self
            .X
            .iter()
            .enumerate()
            .map(|(i, row)| (row.iter().zip(instance.iter()).filter(|(a, b)| a != b).count(), i))
            .collect();
        distances.sort();

        let neighbours: Vec<usize> = distances.iter().take(self.k).map(|&(_, i)| i).collect();
        Ok(frequencies(class_counts(&self.y, &neighbours)))
    }
}

//-----------------------------------------------------------------------------
// Decision tree
//-----------------------------------------------------------------------------

#[derive(Clone, Debug)]
enum Node {
    Leaf { distribution: Vec<f64> },
    Split { feature: usize, children: HashMap<u8, Node>, distribution: Vec<f64> },
}

/// Unpruned multiway tree on categorical features, splits chosen by gain ratio.
/// A category never seen at a node falls back to that node's class distribution.
#[derive(Clone, Debug, Default)]
pub struct DecisionTree {
    root: Option<Node>,
}

fn entropy(counts: [usize; 2]) -> f64 {
    let total = (counts[0] + counts[1]) as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum()
}

impl DecisionTree {
    pub fn new() -> DecisionTree {
        DecisionTree { root: None }
    }

    fn partition(train: &Data, rows: &[usize], feature: usize) -> HashMap<u8, Vec<usize>> {
        let mut groups: HashMap<u8, Vec<usize>> = HashMap::new();
        for &i in rows {
            groups.entry(train.X[i][feature]).or_default().push(i);
        }
        groups
    }

    fn gain_ratio(train: &Data, rows: &[usize], feature: usize, parent_entropy: f64) -> f64 {
        let groups = Self::partition(train, rows, feature);
        if groups.len() < 2 {
            return 0.0;
        }
        let n = rows.len() as f64;
        let mut remainder = 0.0;
        let mut split_info = 0.0;
        for group in groups.values() {
            let w = group.len() as f64 / n;
            remainder += w * entropy(class_counts(&train.y, group));
            split_info -= w * w.log2();
        }
        let gain = parent_entropy - remainder;
        if gain <= 1e-12 || split_info <= 0.0 {
            0.0
        } else {
            gain / split_info
        }
    }

    fn grow(train: &Data, rows: &[usize], available: &mut Vec<bool>) -> Node {
        let counts = class_counts(&train.y, rows);
        let distribution = frequencies(counts);
        if counts[0] == 0 || counts[1] == 0 || rows.len() < 2 {
            return Node::Leaf { distribution };
        }

        let parent_entropy = entropy(counts);
        let mut best: Option<(usize, f64)> = None;
        for feature in (0..train.feature_len).filter(|&j| available[j]) {
            let ratio = Self::gain_ratio(train, rows, feature, parent_entropy);
            if ratio > 0.0 && best.map_or(true, |(_, r)| ratio > r) {
                best = Some((feature, ratio));
            }
        }

        let Some((feature, _)) = best else {
            return Node::Leaf { distribution };
        };

        available[feature] = false;
        let children = Self::partition(train, rows, feature)
            .into_iter()
            .map(|(code, group)| (code, Self::grow(train, &group, available)))
            .collect();
        available[feature] = true;

        Node::Split { feature, children, distribution }
    }
}

impl Classifier for DecisionTree {
    fn name(&self) -> String {
        "DecisionTree".to_string()
    }

    fn fit(&mut self, train: &Data) -> Result<()> {
        require_samples(&self.name(), train)?;
        let rows: Vec<usize> = (0..train.sample_len).collect();
        let mut available = vec![true; train.feature_len];
        self.root = Some(Self::grow(train, &rows, &mut available));
        Ok(())
    }

    fn predict_distribution(&self, instance: &[u8]) -> Result<Vec<f64>> {
        let mut node = self.root.as_ref().ok_or_else(|| not_fitted(&self.name()))?;
        loop {
            match node {
                Node::Leaf { distribution } => return Ok(distribution.clone()),
                Node::Split { feature, children, distribution } => {
                    let code = instance.get(*feature).ok_or_else(|| {
                        GeneticError::training(&self.name(), format!("instance lacks feature {}", feature))
                    })?;
                    match children.get(code) {
                        Some(child) => node = child,
                        None => return Ok(distribution.clone()),
                    }
                }
            }
        }
    }
}
