use crate::cinfo;
use crate::classifier::ClassifierFactory;
use crate::cv::{Fold, FoldRotator};
use crate::data::Data;
use crate::ensemble::ClassifierEnsemble;
use crate::error::{GeneticError, Result};
use crate::param::{DiversityMeasure, Param};
use crate::pool::{FitnessBoard, WorkerPool};
use crate::population::Population;
use crate::utils::{display_indices, round4};
use log::{debug, info, warn};
use rand::seq::index::sample;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;

//-----------------------------------------------------------------------------
// Settings
//-----------------------------------------------------------------------------

/// Resolved search settings for one dataset
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneticSettings {
    pub population_size: usize,
    pub chromosome_length: usize,
    pub generations: usize,
    pub elitism_size: usize,
    pub tournament_size: usize,
    pub crossover_probability: f64,
    pub mutation_probability: f64,
    pub diversity: DiversityMeasure,
    pub folds: usize,
    pub thread_number: usize,
    pub verbose: bool,
    pub colorful: bool,
}

/// (chromosome length, population size, generations, tournament size) suited to a feature count
pub fn derived_sizes(feature_len: usize) -> (usize, usize, usize, usize) {
    match feature_len {
        f if f > 150 => (22, 400, 40, 7),
        f if f > 100 => (20, 250, 35, 6),
        f if f > 50 => (18, 250, 45, 5),
        f if f > 20 => (16, 100, 15, 4),
        _ => (15, 40, 12, 3),
    }
}

impl GeneticSettings {
    /// Fills zero-valued sizes from the feature count, then checks the result
    pub fn from_param(param: &Param, feature_len: usize) -> Result<GeneticSettings> {
        if feature_len == 0 {
            return Err(GeneticError::InvalidData("the dataset has no feature".to_string()));
        }
        let (chromosome_length, population_size, generations, tournament_size) = derived_sizes(feature_len);
        let pick = |configured: usize, derived: usize| if configured == 0 { derived } else { configured };

        let mut settings = GeneticSettings {
            population_size: pick(param.ga.population_size, population_size),
            chromosome_length: pick(param.ga.chromosome_length, chromosome_length),
            generations: pick(param.ga.generations, generations),
            elitism_size: param.ga.elitism_size,
            tournament_size: pick(param.ga.tournament_size, tournament_size),
            crossover_probability: param.ga.crossover_probability,
            mutation_probability: param.ga.mutation_probability,
            diversity: param.ga.diversity,
            folds: param.cv.folds,
            thread_number: param.general.thread_number.max(1),
            verbose: param.general.verbose,
            colorful: param.general.display_colorful,
        };

        if settings.chromosome_length > feature_len {
            warn!(
                "chromosome_length={} exceeds the {} available features, using {}",
                settings.chromosome_length, feature_len, feature_len
            );
            settings.chromosome_length = feature_len;
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.population_size == 0 {
            return Err(GeneticError::InvalidParam("population_size must be at least 1".to_string()));
        }
        if self.elitism_size > self.population_size {
            return Err(GeneticError::InvalidParam(format!(
                "elitism_size={} exceeds population_size={}",
                self.elitism_size, self.population_size
            )));
        }
        if self.tournament_size == 0 || self.tournament_size > self.population_size {
            return Err(GeneticError::InvalidParam(format!(
                "tournament_size={} must be in 1..={}",
                self.tournament_size, self.population_size
            )));
        }
        if self.generations == 0 {
            return Err(GeneticError::InvalidParam("generations must be at least 1".to_string()));
        }
        for (name, p) in [("crossover", self.crossover_probability), ("mutation", self.mutation_probability)] {
            if !(0.0..=1.0).contains(&p) {
                return Err(GeneticError::InvalidParam(format!("{} probability {} is outside [0, 1]", name, p)));
            }
        }
        Ok(())
    }

    /// Diversity is rewarded except during the last fifth of the run
    pub fn uses_diversity(&self, generation: usize) -> bool {
        generation < self.generations - self.generations / 5
    }
}

//-----------------------------------------------------------------------------
// Fitness
//-----------------------------------------------------------------------------

/// Fitness of one feature subset on one fold, on a 0-100 scale.
///
/// An empty subset scores 0 without training anything. Otherwise
/// `0.45 block + 0.45 vote + 0.10 diversity` when `diversity` is set,
/// `0.5 block + 0.5 vote` when it is not, each term rounded to 4 decimals first.
pub fn compute_fitness(
    features: &[usize],
    fold: &Fold,
    factories: &[Arc<dyn ClassifierFactory>],
    diversity: Option<DiversityMeasure>,
    verbose: bool,
) -> Result<f64> {
    if features.is_empty() {
        return Ok(0.0);
    }

    let train = fold.train.restrict(features);
    let test = fold.test.restrict(features);

    let mut ensemble = ClassifierEnsemble::new(factories);
    ensemble.score(&train, &test)?;

    let block = round4(ensemble.blocking()?);
    let vote = round4(ensemble.voting(1));

    let fitness = match diversity {
        Some(measure) => {
            let diversity_score = round4(match measure {
                DiversityMeasure::kappa => ensemble.kappa_diversity(),
                DiversityMeasure::double_fault => ensemble.double_fault_diversity(),
            });
            if verbose {
                info!(
                    "subset {} | block AUC {} | voting AUC {} | {:?} diversity {}",
                    display_indices(features), block, vote, measure, diversity_score
                );
            }
            0.45 * block + 0.45 * vote + 0.10 * diversity_score
        }
        None => {
            if verbose {
                info!("subset {} | block AUC {} | voting AUC {}", display_indices(features), block, vote);
            }
            0.5 * block + 0.5 * vote
        }
    };

    Ok(fitness)
}

//-----------------------------------------------------------------------------
// Genetic operators
//-----------------------------------------------------------------------------

/// Copies the `elitism_size` best chromosomes into the first staging slots.
/// Returns their indices in the live population, best first.
pub fn select_elitism(pop: &mut Population, elitism_size: usize) -> Vec<usize> {
    let roster = pop.elite_roster(elitism_size);
    for (slot, &elite) in roster.iter().enumerate() {
        pop.favored[slot] = pop.chromosomes[elite].clone();
    }
    roster
}

/// Fills every staging slot after the elites with the winner of a tournament among
/// `tournament_size` distinct random chromosomes
pub fn select_using_tournament(pop: &mut Population, elitism_size: usize, tournament_size: usize, rng: &mut ChaCha8Rng) {
    let n = pop.len();
    let size = tournament_size.clamp(1, n.max(1));
    for slot in elitism_size..n {
        let candidates = sample(rng, n, size);
        let mut winner = candidates.index(0);
        for candidate in candidates.iter().skip(1) {
            if pop.compare(candidate, winner) == Ordering::Less {
                winner = candidate;
            }
        }
        pop.favored[slot] = pop.chromosomes[winner].clone();
    }
}

/// One-point prefix exchange between adjacent non-elite staging chromosomes.
/// A feature is never written into a chromosome that already holds it.
pub fn crossover(pop: &mut Population, elitism_size: usize, crossover_probability: f64, rng: &mut ChaCha8Rng) {
    let n = pop.favored.len();
    let mut j = elitism_size;
    while j + 1 < n {
        let length = pop.favored[j].len();
        if length >= 2 && rng.gen_bool(crossover_probability) {
            let point = rng.gen_range(1..length);
            let (left, right) = pop.favored.split_at_mut(j + 1);
            let (a, b) = (&mut left[j], &mut right[0]);
            for p in 0..point {
                let (gene_a, gene_b) = (a.slots[p], b.slots[p]);
                let a_has_b = gene_b.map_or(false, |f| a.contains(f));
                let b_has_a = gene_a.map_or(false, |f| b.contains(f));
                if !a_has_b {
                    a.slots[p] = gene_b;
                }
                if !b_has_a {
                    b.slots[p] = gene_a;
                }
            }
        }
        j += 2;
    }
}

/// Each non-elite staging chromosome mutates one slot with probability `mutation_probability`:
/// cleared half of the time, otherwise set to a feature it does not hold yet
pub fn mutate(pop: &mut Population, elitism_size: usize, mutation_probability: f64, feature_len: usize, rng: &mut ChaCha8Rng) {
    for chromosome in pop.favored.iter_mut().skip(elitism_size) {
        if chromosome.len() == 0 || !rng.gen_bool(mutation_probability) {
            continue;
        }
        let point = rng.gen_range(0..chromosome.len());
        if rng.gen_bool(0.5) {
            chromosome.slots[point] = None;
        } else if let Some(feature) = chromosome.draw_absent_feature(feature_len, rng) {
            chromosome.slots[point] = Some(feature);
        }
    }
}

//-----------------------------------------------------------------------------
// Engine
//-----------------------------------------------------------------------------

/// Result of one complete genetic search
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaOutcome {
    pub best_features: Vec<usize>,
    pub best_fitness: f64,
    pub generation_averages: Vec<f64>,
}

/// Drives one search: initialize, then evaluate / select / crossover / mutate / advance
/// for a fixed number of generations
pub struct GeneticEngine {
    pub settings: GeneticSettings,
    data: Arc<Data>,
    factories: Arc<Vec<Arc<dyn ClassifierFactory>>>,
    population: Population,
    rotator: FoldRotator,
    fold: Option<Arc<Fold>>,
    generation: usize,
    averages: Vec<f64>,
    pool: WorkerPool,
    rng: ChaCha8Rng,
}

impl GeneticEngine {
    pub fn new(
        data: Arc<Data>,
        factories: Vec<Arc<dyn ClassifierFactory>>,
        settings: GeneticSettings,
        rng: ChaCha8Rng,
    ) -> Result<GeneticEngine> {
        settings.validate()?;
        if factories.is_empty() {
            return Err(GeneticError::InvalidParam("the ensemble needs at least one classifier".to_string()));
        }
        let pool = WorkerPool::new(settings.thread_number)?;
        Ok(GeneticEngine {
            rotator: FoldRotator::new(settings.folds),
            settings,
            data,
            factories: Arc::new(factories),
            population: Population::new(),
            fold: None,
            generation: 0,
            averages: Vec::new(),
            pool,
            rng,
        })
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Random population, first fold, evaluation of generation 1
    pub fn initialize(&mut self) -> Result<()> {
        self.population = Population::generate(
            self.settings.population_size,
            self.settings.chromosome_length,
            self.data.feature_len,
            &mut self.rng,
        );
        self.rotate_fold()?;
        self.generation = 1;
        self.averages.clear();
        self.evaluate()?;
        Ok(())
    }

    /// Next fold. A degenerate split depends only on the dataset and the fold count,
    /// so it shows up on the first rotation and ends the run.
    fn rotate_fold(&mut self) -> Result<()> {
        self.fold = Some(self.rotator.rotate(&self.data, &mut self.rng)?);
        Ok(())
    }

    /// Scores every chromosome on the current fold through the worker pool.
    /// Returns the population-wide average fitness.
    pub fn evaluate(&mut self) -> Result<f64> {
        let fold = match &self.fold {
            Some(fold) => Arc::clone(fold),
            None => {
                return Err(GeneticError::DegenerateFold {
                    fold: self.rotator.index,
                    reason: "no fold drawn before evaluation".to_string(),
                })
            }
        };
        let diversity = if self.settings.uses_diversity(self.generation) {
            Some(self.settings.diversity)
        } else {
            None
        };

        let (board, slots) = FitnessBoard::new(self.population.len());
        for (chromosome, slot) in self.population.chromosomes.iter().zip(slots) {
            let features = chromosome.features();
            if features.is_empty() {
                slot.write(0.0);
                continue;
            }
            let fold = Arc::clone(&fold);
            let factories = Arc::clone(&self.factories);
            let verbose = self.settings.verbose;
            self.pool.submit(move || {
                let fitness = compute_fitness(&features, &fold, &factories, diversity, verbose)?;
                slot.write(fitness);
                Ok(())
            })?;
        }

        let failures = self.pool.drain();
        if failures > 0 {
            warn!("Generation {}: {} fitness evaluations failed and were scored 0", self.generation, failures);
        }

        self.population.fitness = board.collect();
        let (average, std) = self.population.average_fitness();
        self.averages.push(average);

        let best = self.population.best().map(|i| self.population.fitness[i]).unwrap_or(0.0);
        cinfo!(
            self.settings.colorful,
            "Generation {}/{} | fold #{} | average fitness {:.2} (sd {:.2}) | best {:.4}",
            self.generation,
            self.settings.generations,
            fold.index + 1,
            average,
            std,
            best
        );
        if self.settings.verbose {
            info!("\n{}", self.population.display());
        }

        Ok(average)
    }

    pub fn select_elitism(&mut self) -> Vec<usize> {
        select_elitism(&mut self.population, self.settings.elitism_size)
    }

    pub fn select_using_tournament(&mut self) {
        select_using_tournament(
            &mut self.population,
            self.settings.elitism_size,
            self.settings.tournament_size,
            &mut self.rng,
        );
    }

    pub fn crossover(&mut self) {
        crossover(
            &mut self.population,
            self.settings.elitism_size,
            self.settings.crossover_probability,
            &mut self.rng,
        );
    }

    pub fn mutate(&mut self) {
        mutate(
            &mut self.population,
            self.settings.elitism_size,
            self.settings.mutation_probability,
            self.data.feature_len,
            &mut self.rng,
        );
    }

    /// Staged chromosomes become live, a new fold is drawn and the generation counter moves on
    pub fn advance(&mut self) -> Result<()> {
        self.population.advance();
        self.rotate_fold()?;
        self.generation += 1;
        Ok(())
    }

    /// best chromosome features and fitness of the live generation
    pub fn best(&self) -> Option<(Vec<usize>, f64)> {
        self.population
            .best()
            .map(|i| (self.population.chromosomes[i].features(), self.population.fitness[i]))
    }

    /// Runs the whole search
    pub fn run(mut self) -> Result<GaOutcome> {
        let time = Instant::now();
        info!(
            "Genetic search: {} chromosomes of {} slots, {} generations, tournament {}, elitism {}, {} folds, {} threads",
            self.settings.population_size,
            self.settings.chromosome_length,
            self.settings.generations,
            self.settings.tournament_size,
            self.settings.elitism_size,
            self.settings.folds,
            self.pool.thread_number()
        );

        self.initialize()?;
        while self.generation < self.settings.generations {
            let elites = self.select_elitism();
            debug!("Elites: {:?}", elites);
            self.select_using_tournament();
            self.crossover();
            self.mutate();
            self.advance()?;
            self.evaluate()?;
        }
        self.pool.shutdown();

        let (best_features, best_fitness) = self.best().unwrap_or((Vec::new(), 0.0));
        cinfo!(
            self.settings.colorful,
            "Best subset {} with fitness {:.4} ({:.2}s)",
            display_indices(&best_features),
            best_fitness,
            time.elapsed().as_secs_f64()
        );

        Ok(GaOutcome {
            best_features,
            best_fitness,
            generation_averages: self.averages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chromosome::Chromosome;
    use crate::classifier::{Classifier, ClassifierKind};
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    fn settings() -> GeneticSettings {
        GeneticSettings {
            population_size: 10,
            chromosome_length: 3,
            generations: 5,
            elitism_size: 2,
            tournament_size: 3,
            crossover_probability: 0.7,
            mutation_probability: 0.1,
            diversity: DiversityMeasure::kappa,
            folds: 2,
            thread_number: 2,
            verbose: false,
            colorful: false,
        }
    }

    /// answers NaN for both classes
    struct NanMember;

    impl Classifier for NanMember {
        fn name(&self) -> String {
            "NanMember".to_string()
        }
        fn fit(&mut self, _train: &Data) -> Result<()> {
            Ok(())
        }
        fn predict_distribution(&self, _instance: &[u8]) -> Result<Vec<f64>> {
            Ok(vec![f64::NAN, f64::NAN])
        }
    }

    struct FailingFit;

    impl Classifier for FailingFit {
        fn name(&self) -> String {
            "FailingFit".to_string()
        }
        fn fit(&mut self, _train: &Data) -> Result<()> {
            Err(GeneticError::training("FailingFit", "cannot learn"))
        }
        fn predict_distribution(&self, _instance: &[u8]) -> Result<Vec<f64>> {
            Err(GeneticError::training("FailingFit", "never fitted"))
        }
    }

    /// feature 0 carries the class, the others are noise
    fn signal_data() -> Data {
        let X = (0..20).map(|i| vec![(i % 2) as u8, ((i / 3) % 3) as u8, ((i * 7) % 4) as u8, (i % 5) as u8]).collect();
        let y = (0..20).map(|i| (i % 2) as u8).collect();
        Data::from_codes(X, y).unwrap()
    }

    fn fold_of(data: &Data) -> Fold {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let fold = FoldRotator::new(2).rotate(data, &mut rng).unwrap();
        (*fold).clone()
    }

    #[test]
    fn test_derived_sizes_table() {
        assert_eq!(derived_sizes(500), (22, 400, 40, 7));
        assert_eq!(derived_sizes(150), (20, 250, 35, 6));
        assert_eq!(derived_sizes(100), (18, 250, 45, 5));
        assert_eq!(derived_sizes(50), (16, 100, 15, 4));
        assert_eq!(derived_sizes(20), (15, 40, 12, 3));
    }

    #[test]
    fn test_settings_from_param_derives_and_clamps() {
        let param = Param::default();
        let settings = GeneticSettings::from_param(&param, 10).unwrap();
        assert_eq!(settings.population_size, 40);
        assert_eq!(settings.generations, 12);
        assert_eq!(settings.tournament_size, 3);
        assert_eq!(settings.chromosome_length, 10, "chromosome length is clamped to the feature count");

        let mut param = Param::default();
        param.ga.population_size = 4;
        param.ga.tournament_size = 2;
        assert!(GeneticSettings::from_param(&param, 10).is_err(), "elitism 5 cannot exceed population 4");
        assert!(GeneticSettings::from_param(&Param::default(), 0).is_err());
    }

    #[test]
    fn test_uses_diversity_first_four_fifths() {
        let mut s = settings();
        s.generations = 10;
        let flags: Vec<bool> = (1..=10).map(|g| s.uses_diversity(g)).collect();
        assert_eq!(flags, vec![true, true, true, true, true, true, true, false, false, false]);
    }

    #[test]
    fn test_empty_chromosome_fitness_skips_classifiers() {
        static CREATED: AtomicUsize = AtomicUsize::new(0);
        let counting = || {
            CREATED.fetch_add(1, AtomicOrdering::SeqCst);
            Box::new(crate::classifier::MajorityClass::new()) as Box<dyn Classifier>
        };
        let data = signal_data();
        let fold = fold_of(&data);
        let factories: Vec<Arc<dyn ClassifierFactory>> = vec![Arc::new(counting)];
        let fitness = compute_fitness(&[], &fold, &factories, Some(DiversityMeasure::kappa), false).unwrap();
        assert_eq!(fitness, 0.0);
        assert_eq!(CREATED.load(AtomicOrdering::SeqCst), 0, "no classifier may be created for an empty subset");
    }

    #[test]
    fn test_fitness_weights() {
        let data = signal_data();
        let fold = fold_of(&data);
        let factories: Vec<Arc<dyn ClassifierFactory>> =
            vec![Arc::new(ClassifierKind::DecisionTree), Arc::new(ClassifierKind::NaiveBayes)];

        // feature 0 is a perfect predictor: both AUCs are 100, members agree on the same labels
        let without = compute_fitness(&[0], &fold, &factories, None, false).unwrap();
        assert_eq!(without, 100.0);
        let with = compute_fitness(&[0], &fold, &factories, Some(DiversityMeasure::kappa), false).unwrap();
        assert!((with - 90.0).abs() < 1e-9, "0.45*100 + 0.45*100 + 0.1*0 expected, got {}", with);
        let df = compute_fitness(&[0], &fold, &factories, Some(DiversityMeasure::double_fault), false).unwrap();
        assert!((df - 100.0).abs() < 1e-9, "no joint error gives full double-fault diversity, got {}", df);
    }

    #[test]
    fn test_select_elitism_fills_first_slots() {
        let mut pop = Population::test_with(
            vec![vec![Some(0)], vec![Some(1)], vec![Some(2)], vec![Some(3)]],
            vec![1.0, 9.0, 5.0, 7.0],
        );
        let roster = select_elitism(&mut pop, 2);
        assert_eq!(roster, vec![1, 3]);
        assert_eq!(pop.favored[0].slots, vec![Some(1)]);
        assert_eq!(pop.favored[1].slots, vec![Some(3)]);
    }

    #[test]
    fn test_tournament_over_whole_population_picks_the_best() {
        let mut pop = Population::test_with(
            vec![vec![Some(0), Some(1)], vec![Some(2), None], vec![Some(3), Some(4)], vec![Some(5), Some(6)]],
            vec![3.0, 8.0, 8.0, 1.0],
        );
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        select_using_tournament(&mut pop, 1, 4, &mut rng);
        for slot in 1..4 {
            assert_eq!(pop.favored[slot].slots, vec![Some(2), None], "ties go to the shorter chromosome");
        }
    }

    #[test]
    fn test_tournament_leaves_elites_untouched() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut pop = Population::generate(10, 3, 8, &mut rng);
        pop.fitness = (0..10).map(|i| i as f64).collect();
        let elites = select_elitism(&mut pop, 2);
        let staged: Vec<Chromosome> = pop.favored[..2].to_vec();
        select_using_tournament(&mut pop, 2, 3, &mut rng);
        assert_eq!(elites, vec![9, 8]);
        assert_eq!(pop.favored[..2].to_vec(), staged);
    }

    #[test]
    fn test_crossover_and_mutation_keep_chromosomes_valid() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut pop = Population::generate(30, 6, 9, &mut rng);
        for _ in 0..50 {
            pop.favored = pop.chromosomes.clone();
            crossover(&mut pop, 2, 1.0, &mut rng);
            mutate(&mut pop, 2, 1.0, 9, &mut rng);
            for chromosome in &pop.favored {
                assert_eq!(chromosome.len(), 6, "length must never change");
                assert!(!chromosome.has_duplicates(), "no duplicated feature allowed: {}", chromosome);
                assert!(chromosome.features().iter().all(|&f| f < 9));
            }
            assert_eq!(pop.favored[..2], pop.chromosomes[..2], "elites are exempt from crossover and mutation");
            pop.advance();
        }
    }

    #[test]
    fn test_crossover_swaps_prefix_without_duplicates() {
        let mut pop = Population::test_with(
            vec![vec![Some(0), Some(1), Some(2)], vec![Some(1), Some(3), Some(4)]],
            vec![0.0, 0.0],
        );
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        crossover(&mut pop, 0, 1.0, &mut rng);
        let a = &pop.favored[0];
        let b = &pop.favored[1];
        assert!(!a.has_duplicates() && !b.has_duplicates());
        // feature 1 from b cannot enter a at slot 0 because a already holds it
        assert_eq!(a.slots[0], Some(0));
    }

    #[test]
    fn test_zero_probabilities_change_nothing() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut pop = Population::generate(10, 4, 20, &mut rng);
        let before = pop.favored.clone();
        crossover(&mut pop, 0, 0.0, &mut rng);
        mutate(&mut pop, 0, 0.0, 20, &mut rng);
        assert_eq!(pop.favored, before);
    }

    #[test]
    fn test_engine_run_keeps_population_shape() {
        let data = Arc::new(signal_data());
        let factories: Vec<Arc<dyn ClassifierFactory>> =
            vec![Arc::new(ClassifierKind::MajorityClass), Arc::new(ClassifierKind::NaiveBayes)];
        let mut engine = GeneticEngine::new(data, factories, settings(), ChaCha8Rng::seed_from_u64(42)).unwrap();

        engine.initialize().unwrap();
        assert_eq!(engine.generation(), 1);
        for _ in 2..=5 {
            engine.select_elitism();
            engine.select_using_tournament();
            engine.crossover();
            engine.mutate();
            engine.advance().unwrap();
            engine.evaluate().unwrap();
            assert_eq!(engine.population().len(), 10, "population size is constant");
            assert_eq!(engine.population().fitness.len(), 10, "fitness array size is constant");
        }
        assert_eq!(engine.generation(), 5);
        let (features, fitness) = engine.best().unwrap();
        assert!(features.len() <= 3);
        assert!((0.0..=100.0).contains(&fitness));
    }

    #[test]
    fn test_engine_fails_on_degenerate_first_fold() {
        let data = Data::from_codes(vec![vec![0], vec![1], vec![0]], vec![0, 0, 1]).unwrap();
        let factories: Vec<Arc<dyn ClassifierFactory>> = vec![Arc::new(ClassifierKind::MajorityClass)];
        let mut s = settings();
        s.chromosome_length = 1;
        let engine = GeneticEngine::new(Arc::new(data), factories, s, ChaCha8Rng::seed_from_u64(42)).unwrap();
        assert!(matches!(engine.run(), Err(GeneticError::DegenerateFold { .. })));
    }

    #[test]
    fn test_engine_requires_classifiers() {
        let result = GeneticEngine::new(Arc::new(signal_data()), Vec::new(), settings(), ChaCha8Rng::seed_from_u64(42));
        assert!(result.is_err());
    }

    #[test]
    fn test_nan_distribution_fails_the_fitness_task() {
        let data = signal_data();
        let fold = fold_of(&data);
        let factories: Vec<Arc<dyn ClassifierFactory>> =
            vec![Arc::new(|| Box::new(NanMember) as Box<dyn Classifier>)];
        let result = compute_fitness(&[0], &fold, &factories, Some(DiversityMeasure::kappa), false);
        assert!(
            matches!(result, Err(GeneticError::ClassifierTraining { .. })),
            "a NaN probability must fail the evaluation, not stall it"
        );
    }

    #[test]
    fn test_engine_scores_failing_classifier_zero() {
        let data = Arc::new(signal_data());
        let factories: Vec<Arc<dyn ClassifierFactory>> = vec![
            Arc::new(ClassifierKind::MajorityClass),
            Arc::new(|| Box::new(FailingFit) as Box<dyn Classifier>),
        ];

        let mut engine =
            GeneticEngine::new(Arc::clone(&data), factories.clone(), settings(), ChaCha8Rng::seed_from_u64(42)).unwrap();
        engine.initialize().unwrap();
        assert_eq!(engine.population().fitness, vec![0.0; 10], "failed evaluations are scored 0");

        let outcome = GeneticEngine::new(data, factories, settings(), ChaCha8Rng::seed_from_u64(42))
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(outcome.best_fitness, 0.0);
        assert_eq!(outcome.generation_averages, vec![0.0; 5], "every generation completes despite the failures");
    }

    #[test]
    fn test_engine_run_with_five_folds() {
        let data = Arc::new(signal_data());
        let factories: Vec<Arc<dyn ClassifierFactory>> = vec![Arc::new(ClassifierKind::MajorityClass)];
        let mut s = settings();
        s.folds = 5;

        let outcome = GeneticEngine::new(data, factories, s, ChaCha8Rng::seed_from_u64(42)).unwrap().run().unwrap();
        let unique: std::collections::HashSet<usize> = outcome.best_features.iter().copied().collect();
        assert!(outcome.best_features.len() <= 3);
        assert_eq!(unique.len(), outcome.best_features.len());
        assert!((0.0..=100.0).contains(&outcome.best_fitness));
        assert_eq!(outcome.generation_averages.len(), 5);
    }
}
