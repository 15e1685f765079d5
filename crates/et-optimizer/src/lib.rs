//! # et-optimizer
//!
//! Evolution-strategy engine for Evotune.
//!
//! Provides a CMA-ES strategy with a generate/update interface, a hall of fame
//! of best-ever individuals, per-generation fitness statistics, and the loop
//! that ties them to a [`et_types::FitnessTask`].

mod algorithm;
mod cma;
mod hall_of_fame;
mod stats;

pub use algorithm::{ea_generate_update, evaluate_population, GenerateUpdate};
pub use cma::{default_lambda, CmaOptions, CmaStrategy};
pub use hall_of_fame::HallOfFame;
pub use stats::{GenerationStats, Logbook};
