#![allow(non_snake_case)]

pub mod chromosome;
pub mod classifier;
pub mod cv;
pub mod data;
pub mod ensemble;
pub mod error;
pub mod experiment;
pub mod ga;
pub mod param;
pub mod pool;
pub mod population;
pub mod ranking;
pub mod utils;

use crate::classifier::ClassifierFactory;
use crate::data::Data;
use crate::error::{GeneticError, Result};
use crate::experiment::{Experiment, IterationRecord};
use crate::ga::{GeneticEngine, GeneticSettings};
use crate::param::Param;
use crate::ranking::combinatorial_ranking;
use log::{debug, info, warn};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Loads the dataset named in `param` and runs every search on it
pub fn run(param: &Param, running: Arc<AtomicBool>) -> Result<Experiment> {
    let mut data = Data::new();
    data.load_data(&param.data.X, &param.data.y, param.data.features_in_rows, &param.data.classes)?;
    info!("{} features, {} samples loaded", data.feature_len, data.sample_len);
    debug!("{:?}", data);

    run_on_data(&data, param, running)
}

/// Runs the searches with the classifiers listed in `param`
pub fn run_on_data(data: &Data, param: &Param, running: Arc<AtomicBool>) -> Result<Experiment> {
    let factories: Vec<Arc<dyn ClassifierFactory>> = param
        .ensemble
        .classifiers
        .iter()
        .map(|kind| Arc::new(kind.clone()) as Arc<dyn ClassifierFactory>)
        .collect();
    run_with_classifiers(data, param, factories, running)
}

/// Runs `general.iterations` independent searches, each seeded from the master seed,
/// then ranks the feature combinations shared by their best subsets.
///
/// Clearing `running` stops before the next search starts; a started search always completes.
pub fn run_with_classifiers(
    data: &Data,
    param: &Param,
    factories: Vec<Arc<dyn ClassifierFactory>>,
    running: Arc<AtomicBool>,
) -> Result<Experiment> {
    let start = Instant::now();
    if data.sample_len == 0 || data.feature_len == 0 {
        return Err(GeneticError::InvalidData(format!(
            "cannot search a dataset of {} samples and {} features",
            data.sample_len, data.feature_len
        )));
    }

    let mut experiment = Experiment::new(param.clone());
    let mut master_rng = ChaCha8Rng::seed_from_u64(param.general.seed);

    for iteration in 1..=param.general.iterations {
        if !running.load(Ordering::Relaxed) {
            warn!("Signal received: stopping after {} of {} runs", iteration - 1, param.general.iterations);
            break;
        }

        let seed = master_rng.next_u64();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let mut run_data = data.clone();
        let balanced_out = if param.data.balance { run_data.balance(&mut rng) } else { 0 };

        let settings = GeneticSettings::from_param(param, run_data.feature_len)?;
        cinfo!(
            param.general.display_colorful,
            "Iteration {}/{}\n-----------------------------------------------------",
            iteration,
            param.general.iterations
        );

        let engine = GeneticEngine::new(Arc::new(run_data), factories.clone(), settings.clone(), rng)?;
        let outcome = engine.run()?;

        let best_names = outcome.best_features.iter().map(|&j| data.features[j].clone()).collect();
        experiment.runs.push(IterationRecord { iteration, seed, settings, balanced_out, outcome, best_names });
    }

    experiment.ranking = combinatorial_ranking(&experiment.best_subsets(), experiment.runs.len());
    experiment.execution_time = start.elapsed().as_secs_f64();
    cinfo!(
        param.general.display_colorful,
        "{} runs completed in {:.2}s, {} ranked interactions",
        experiment.runs.len(),
        experiment.execution_time,
        experiment.ranking.len()
    );

    Ok(experiment)
}
