//! The fitness contract between the optimizer and the task being tuned.

use std::cmp::Ordering;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{EtResult, FitnessError};

/// Whether we are maximizing or minimizing the fitness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FitnessDirection {
    #[default]
    Maximize,
    Minimize,
}

impl FitnessDirection {
    pub fn from_maximize(maximize: bool) -> Self {
        if maximize {
            Self::Maximize
        } else {
            Self::Minimize
        }
    }

    /// Sign applied to raw fitness values (+1 maximize, -1 minimize).
    pub fn weight(self) -> f64 {
        match self {
            Self::Maximize => 1.0,
            Self::Minimize => -1.0,
        }
    }

    /// `true` when `candidate` is strictly better than `incumbent`.
    pub fn is_better(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Self::Maximize => candidate > incumbent,
            Self::Minimize => candidate < incumbent,
        }
    }

    /// Ordering that sorts the best value first.
    pub fn best_first(self, a: f64, b: f64) -> Ordering {
        let ord = b.partial_cmp(&a).unwrap_or(Ordering::Equal);
        match self {
            Self::Maximize => ord,
            Self::Minimize => ord.reverse(),
        }
    }
}

/// A task whose parameters are being tuned.
///
/// Implementors own whatever environment the individual is scored in; the
/// optimizer only sees a flat vector of `num_features` genes and one scalar
/// back. Evaluation happens from several threads at once.
pub trait FitnessTask: Send + Sync {
    /// Name of the fitness object's kind, used in run directory names.
    fn kind(&self) -> &str;

    /// Name of the game or environment the individual plays.
    fn game_name(&self) -> &str;

    /// Length of an individual.
    fn num_features(&self) -> usize;

    /// Score one individual.
    fn evaluate(&self, genes: &[f64]) -> EtResult<f64>;

    /// Files describing this task, copied into every run directory.
    fn source_files(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Check the individual length before delegating to [`FitnessTask::evaluate`].
    fn evaluate_checked(&self, genes: &[f64]) -> EtResult<f64> {
        if genes.len() != self.num_features() {
            return Err(FitnessError::DimensionMismatch {
                expected: self.num_features(),
                actual: genes.len(),
            }
            .into());
        }
        let value = self.evaluate(genes)?;
        if !value.is_finite() {
            return Err(FitnessError::NonFinite { value }.into());
        }
        Ok(value)
    }
}

impl<T: FitnessTask + ?Sized> FitnessTask for Box<T> {
    fn kind(&self) -> &str {
        (**self).kind()
    }

    fn game_name(&self) -> &str {
        (**self).game_name()
    }

    fn num_features(&self) -> usize {
        (**self).num_features()
    }

    fn evaluate(&self, genes: &[f64]) -> EtResult<f64> {
        (**self).evaluate(genes)
    }

    fn source_files(&self) -> Vec<PathBuf> {
        (**self).source_files()
    }
}
