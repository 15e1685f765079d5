//! # et-experiment
//!
//! Experiment runner for Evotune.
//!
//! Selects CMA-ES hyperparameters from the task's game name, creates a
//! timestamped run directory, runs the optimizer against a
//! [`et_types::FitnessTask`] and writes the run's artifacts: source
//! snapshots, parameters, final model, training time, logbook, summary and
//! fitness graph.

pub mod config;
pub mod plot;
pub mod run_dir;
pub mod tasks;
pub mod trainer;

pub use config::{ExperimentConfig, DEFAULT_SEED, LOGS_DIR_ENV};
pub use plot::plot_fitness;
pub use run_dir::{run_directory_name, RunDirectory, RunSummary};
pub use tasks::{Benchmark, BenchmarkFunction, CommandFitness};
pub use trainer::{TrainEs, TrainOutcome};
