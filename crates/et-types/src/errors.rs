use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the Evotune system
#[derive(Error, Debug)]
pub enum EtError {
    #[error("Fitness error: {0}")]
    Fitness(#[from] FitnessError),

    #[error("Optimizer error: {0}")]
    Optimizer(#[from] OptimizerError),

    #[error("Experiment error: {0}")]
    Experiment(#[from] ExperimentError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Plot error: {0}")]
    Plot(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors raised while evaluating an individual
#[derive(Error, Debug)]
pub enum FitnessError {
    #[error("Evaluation failed: {message}")]
    EvaluationFailed { message: String },

    #[error("Dimension mismatch: expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Non-finite fitness value: {value}")]
    NonFinite { value: f64 },

    #[error("External command `{command}` failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Unknown fitness task: {name}")]
    UnknownTask { name: String },
}

/// Errors raised by the evolution strategy
#[derive(Error, Debug)]
pub enum OptimizerError {
    #[error("Empty population")]
    EmptyPopulation,

    #[error("Population of {size} is smaller than the {mu} parents required")]
    PopulationTooSmall { size: usize, mu: usize },

    #[error("Individual {index} has not been evaluated")]
    Unevaluated { index: usize },

    #[error("Dimension mismatch: strategy has {expected} dimensions, individual has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Numerical breakdown: {message}")]
    NumericalBreakdown { message: String },
}

/// Errors raised while managing an experiment run
#[derive(Error, Debug)]
pub enum ExperimentError {
    #[error("Run directory already exists: {}", .path.display())]
    RunDirectoryExists { path: PathBuf },

    #[error("Snapshot source not found: {}", .path.display())]
    MissingSource { path: PathBuf },

    #[error("Snapshot {} collides with another source of the same name", .path.display())]
    SnapshotCollision { path: PathBuf },

    #[error("Training produced no result")]
    NoResult,
}

/// Result type alias for Evotune operations
pub type EtResult<T> = Result<T, EtError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::EtError::Validation(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::EtError::Config(format!($($arg)*))
    };
}
