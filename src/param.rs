use crate::classifier::ClassifierKind;
use crate::error::{GeneticError, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;

/// Pairwise diversity statistic mixed into the fitness during early generations
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[allow(non_camel_case_types)]
pub enum DiversityMeasure {
    kappa,
    double_fault,
}

// Field definitions and associated default values

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Param {
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub data: Data,
    #[serde(default)]
    pub ga: GA,
    #[serde(default)]
    pub cv: CV,
    #[serde(default)]
    pub ensemble: Ensemble,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct General {
    #[serde(default = "seed_default")]
    pub seed: u64,
    #[serde(default = "one_default")]
    pub thread_number: usize,
    #[serde(default = "iterations_default")]
    pub iterations: usize,
    #[serde(default = "log_base_default")]
    pub log_base: String,
    #[serde(default = "log_suffix_default")]
    pub log_suffix: String,
    #[serde(default = "log_level_default")]
    pub log_level: String,
    #[serde(default = "true_default")]
    pub display_colorful: bool,
    #[serde(default = "false_default")]
    pub verbose: bool,
    #[serde(default = "empty_string")]
    pub save_exp: String,
    #[serde(default = "rank_file_default")]
    pub rank_file: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Data {
    #[serde(default = "empty_string")]
    pub X: String,
    #[serde(default = "empty_string")]
    pub y: String,
    #[serde(default = "true_default")]
    pub features_in_rows: bool,
    #[serde(default = "class_names_default")]
    pub classes: Vec<String>,
    #[serde(default = "false_default")]
    pub balance: bool,
}

/// Genetic search settings. Zero-valued sizes are derived from the feature count.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GA {
    #[serde(default = "uzero_default")]
    pub population_size: usize,
    #[serde(default = "uzero_default")]
    pub chromosome_length: usize,
    #[serde(default = "uzero_default")]
    pub generations: usize,
    #[serde(default = "elitism_size_default")]
    pub elitism_size: usize,
    #[serde(default = "uzero_default")]
    pub tournament_size: usize,
    #[serde(default = "crossover_probability_default")]
    pub crossover_probability: f64,
    #[serde(default = "mutation_probability_default")]
    pub mutation_probability: f64,
    #[serde(default = "diversity_default")]
    pub diversity: DiversityMeasure,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CV {
    #[serde(default = "folds_default")]
    pub folds: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Ensemble {
    #[serde(default = "classifiers_default")]
    pub classifiers: Vec<ClassifierKind>,
}

// Default section definitions

impl Default for General {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).expect("empty General section is valid")
    }
}

impl Default for Data {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).expect("empty Data section is valid")
    }
}

impl Default for GA {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).expect("empty GA section is valid")
    }
}

impl Default for CV {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).expect("empty CV section is valid")
    }
}

impl Default for Ensemble {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).expect("empty Ensemble section is valid")
    }
}

impl Default for Param {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).expect("empty Param is valid")
    }
}

impl Param {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Reads a YAML parameter file and validates it
pub fn get(param_file: String) -> Result<Param> {
    let param_file_reader = File::open(param_file)?;
    let param_reader = BufReader::new(param_file_reader);

    let mut config: Param = serde_yaml::from_reader(param_reader)?;

    validate(&mut config)?;

    Ok(config)
}

pub fn validate(param: &mut Param) -> Result<()> {
    if !param.general.log_base.is_empty() {
        param.general.display_colorful = false;
    }

    if param.general.thread_number == 0 {
        warn!("thread_number=0 is not meaningful, using a single worker thread.");
        param.general.thread_number = 1;
    }

    if param.general.iterations == 0 {
        return Err(GeneticError::InvalidParam(
            "iterations must be at least 1".to_string(),
        ));
    }

    if param.X_without_y() {
        return Err(GeneticError::InvalidParam(
            "Both X and y must be provided together.".to_string(),
        ));
    }

    validate_probabilities(param)?;

    if param.cv.folds < 2 {
        return Err(GeneticError::InvalidParam(format!(
            "Invalid folds={}. At least 2 folds are required.",
            param.cv.folds
        )));
    }

    if param.ensemble.classifiers.is_empty() {
        return Err(GeneticError::InvalidParam(
            "The ensemble needs at least one classifier.".to_string(),
        ));
    }

    if param.ensemble.classifiers.len() < 2 {
        warn!("A single classifier cannot express any diversity: the diversity term will stay at 0.");
    }

    for kind in &param.ensemble.classifiers {
        if let ClassifierKind::NearestNeighbours { k: 0 } = kind {
            return Err(GeneticError::InvalidParam(
                "NearestNeighbours requires k >= 1.".to_string(),
            ));
        }
    }

    if param.ga.population_size > 0 && param.ga.elitism_size > param.ga.population_size {
        return Err(GeneticError::InvalidParam(format!(
            "Invalid elitism_size={}. Must not exceed population_size={}.",
            param.ga.elitism_size, param.ga.population_size
        )));
    }

    Ok(())
}

impl Param {
    #[allow(non_snake_case)]
    fn X_without_y(&self) -> bool {
        self.data.X.is_empty() != self.data.y.is_empty()
    }
}

fn validate_probabilities(param: &Param) -> Result<()> {
    if !(0.0..=1.0).contains(&param.ga.crossover_probability) {
        return Err(GeneticError::InvalidParam(format!(
            "Invalid crossover_probability={:.3}. Must be in range [0, 1].",
            param.ga.crossover_probability
        )));
    }

    if !(0.0..=1.0).contains(&param.ga.mutation_probability) {
        return Err(GeneticError::InvalidParam(format!(
            "Invalid mutation_probability={:.3}. Must be in range [0, 1].",
            param.ga.mutation_probability
        )));
    }

    Ok(())
}

// Default value definitions

fn seed_default() -> u64 {
    4815162342
}
fn empty_string() -> String {
    "".to_string()
}
fn log_base_default() -> String {
    "".to_string()
}
fn log_suffix_default() -> String {
    "log".to_string()
}
fn log_level_default() -> String {
    "info".to_string()
}
fn rank_file_default() -> String {
    "interaction.rank".to_string()
}
fn iterations_default() -> usize {
    20
}
fn folds_default() -> usize {
    5
}
fn elitism_size_default() -> usize {
    5
}
fn crossover_probability_default() -> f64 {
    0.7
}
fn mutation_probability_default() -> f64 {
    0.1
}
fn diversity_default() -> DiversityMeasure {
    DiversityMeasure::kappa
}
fn classifiers_default() -> Vec<ClassifierKind> {
    vec![
        ClassifierKind::DecisionTree,
        ClassifierKind::NaiveBayes,
        ClassifierKind::NearestNeighbours { k: 1 },
        ClassifierKind::NearestNeighbours { k: 3 },
        ClassifierKind::NearestNeighbours { k: 5 },
    ]
}
fn class_names_default() -> Vec<String> {
    Vec::new()
}
fn false_default() -> bool {
    false
}
fn true_default() -> bool {
    true
}
fn uzero_default() -> usize {
    0
}
fn one_default() -> usize {
    1
}
