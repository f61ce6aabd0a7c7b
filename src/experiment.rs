use crate::error::Result;
use crate::ga::{GaOutcome, GeneticSettings};
use crate::param::Param;
use crate::ranking::RankedInteraction;
use crate::utils::display_indices;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Outcome of one independent genetic search
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub seed: u64,
    pub settings: GeneticSettings,
    /// samples dropped by class balancing before the search
    pub balanced_out: usize,
    pub outcome: GaOutcome,
    /// names of `outcome.best_features`, same order
    pub best_names: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    /// Experiment ID, i.e., timestamp and seed
    pub id: String,
    pub timestamp: String,
    /// crate version and git hash used
    pub version: String,
    pub parameters: Param,
    pub runs: Vec<IterationRecord>,
    pub ranking: Vec<RankedInteraction>,
    /// Execution time in seconds
    pub execution_time: f64,
}

impl Experiment {
    pub fn new(parameters: Param) -> Experiment {
        let now = chrono::Local::now();
        Experiment {
            id: format!("{}_{}", now.format("%Y%m%d_%H%M%S"), parameters.general.seed),
            timestamp: now.to_rfc3339(),
            version: version_string(),
            parameters,
            runs: Vec::new(),
            ranking: Vec::new(),
            execution_time: 0.0,
        }
    }

    /// best feature-name subsets, one per completed run
    pub fn best_subsets(&self) -> Vec<Vec<String>> {
        self.runs.iter().map(|r| r.best_names.clone()).collect()
    }

    pub fn display_results(&self) -> String {
        let mut text = format!(
            "Experiment {} ({}) | {} runs | {:.2}s\n",
            self.id,
            self.version,
            self.runs.len(),
            self.execution_time
        );
        for run in &self.runs {
            text.push_str(&format!(
                "run {:>3} | fitness {:>8.4} | {} {}\n",
                run.iteration,
                run.outcome.best_fitness,
                display_indices(&run.outcome.best_features),
                run.best_names.join("\t")
            ));
        }
        text
    }

    /// Saves according to the extension: `.json`, or `.bin`/`.bincode`. Anything else is saved as JSON.
    pub fn save_auto<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        match extension(path).as_str() {
            "json" => self.save_json(path),
            "bin" | "bincode" => self.save_bincode(path),
            _ => {
                warn!("Unknown format. Saving experiment in JSON.");
                self.save_json(path.with_extension("json"))
            }
        }
    }

    fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn save_bincode<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(self)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    pub fn load_auto<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match extension(path).as_str() {
            "bin" | "bincode" => Self::load_bincode(path),
            "json" => Self::load_json(path),
            _ => Self::load_json(path).or_else(|_| Self::load_bincode(path)),
        }
    }

    fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn load_bincode<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(bincode::deserialize(&bytes)?)
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

pub fn version_string() -> String {
    match option_env!("GESNP_GIT_SHA") {
        Some(sha) => format!("{}#{}", env!("CARGO_PKG_VERSION"), sha),
        None => env!("CARGO_PKG_VERSION").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::DiversityMeasure;
    use crate::string_vec;

    fn sample_experiment() -> Experiment {
        let mut experiment = Experiment::new(Param::default());
        experiment.runs.push(IterationRecord {
            iteration: 1,
            seed: 7,
            settings: GeneticSettings {
                population_size: 10,
                chromosome_length: 3,
                generations: 5,
                elitism_size: 2,
                tournament_size: 3,
                crossover_probability: 0.7,
                mutation_probability: 0.1,
                diversity: DiversityMeasure::double_fault,
                folds: 5,
                thread_number: 1,
                verbose: false,
                colorful: false,
            },
            balanced_out: 0,
            outcome: GaOutcome {
                best_features: vec![4, 1],
                best_fitness: 73.125,
                generation_averages: vec![50.0, 61.5],
            },
            best_names: string_vec!["rs005", "rs002"],
        });
        experiment.execution_time = 1.5;
        experiment
    }

    #[test]
    fn test_save_and_load_json() {
        let experiment = sample_experiment();
        let path = std::env::temp_dir().join(format!("gesnp_exp_{}.json", std::process::id()));
        experiment.save_auto(&path).unwrap();
        let loaded = Experiment::load_auto(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, experiment, "a JSON experiment should load back identically");
    }

    #[test]
    fn test_save_and_load_bincode() {
        let experiment = sample_experiment();
        let path = std::env::temp_dir().join(format!("gesnp_exp_{}.bin", std::process::id()));
        experiment.save_auto(&path).unwrap();
        let loaded = Experiment::load_auto(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, experiment);
    }

    #[test]
    fn test_best_subsets_and_display() {
        let experiment = sample_experiment();
        assert_eq!(experiment.best_subsets(), vec![string_vec!["rs005", "rs002"]] as Vec<Vec<String>>);
        let text = experiment.display_results();
        assert!(text.contains("73.1250"), "best fitness should be displayed: {}", text);
        assert!(text.contains("[4, 1]"));
    }

    #[test]
    fn test_version_string_starts_with_crate_version() {
        assert!(version_string().starts_with(env!("CARGO_PKG_VERSION")));
    }
}
