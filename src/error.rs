use thiserror::Error;

/// Errors raised while loading data, configuring or running the genetic search
#[derive(Error, Debug)]
pub enum GeneticError {
    /// A task was submitted to a worker pool after its shutdown
    #[error("worker pool is closed: no task can be submitted after shutdown")]
    PoolClosed,

    /// A classifier failed to fit or to predict
    #[error("classifier {classifier} failed: {reason}")]
    ClassifierTraining { classifier: String, reason: String },

    /// The stratified split cannot produce a usable fold
    #[error("degenerate fold #{fold}: {reason}")]
    DegenerateFold { fold: usize, reason: String },

    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),
}

impl GeneticError {
    pub(crate) fn training(classifier: &str, reason: impl Into<String>) -> Self {
        GeneticError::ClassifierTraining {
            classifier: classifier.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GeneticError>;
