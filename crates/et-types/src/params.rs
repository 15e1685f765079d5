//! Evolution-strategy hyperparameters and the per-game presets.

use serde::{Deserialize, Serialize};

use crate::errors::{EtError, EtResult};

/// Substring of a game name that selects the mountain-car preset.
pub const MOUNTAIN_CAR_MARKER: &str = "MountainCar";

/// Hyperparameters of one CMA-ES training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsParams {
    /// Value every coordinate of the initial centroid starts at.
    pub centroid: f64,
    /// Initial step size.
    pub sigma: f64,
    /// Offspring per generation, as a multiple of the individual length.
    pub gen_size_factor: usize,
    /// Number of generations.
    pub ngen: usize,
}

impl EsParams {
    /// Best known settings for CartPole and Acrobot.
    pub fn cart_pole_acrobot_best() -> Self {
        Self {
            centroid: 5.0,
            sigma: 5.0,
            gen_size_factor: 20,
            ngen: 400,
        }
    }

    /// Best known settings for MountainCar. The sparse reward needs a wide
    /// initial search around the origin and many more generations.
    pub fn mountain_car_best() -> Self {
        Self {
            centroid: 0.0,
            sigma: 50.0,
            gen_size_factor: 20,
            ngen: 2000,
        }
    }

    /// Pick the preset for a game name.
    pub fn for_game(game_name: &str) -> Self {
        if game_name.contains(MOUNTAIN_CAR_MARKER) {
            Self::mountain_car_best()
        } else {
            Self::cart_pole_acrobot_best()
        }
    }

    pub fn with_ngen(mut self, ngen: usize) -> Self {
        self.ngen = ngen;
        self
    }

    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    pub fn with_centroid(mut self, centroid: f64) -> Self {
        self.centroid = centroid;
        self
    }

    pub fn with_gen_size_factor(mut self, factor: usize) -> Self {
        self.gen_size_factor = factor;
        self
    }

    /// Offspring count (`lambda`) for an individual of `num_features` genes.
    pub fn population_size(&self, num_features: usize) -> usize {
        self.gen_size_factor * num_features
    }

    pub fn initial_centroid(&self, num_features: usize) -> Vec<f64> {
        vec![self.centroid; num_features]
    }

    /// Default run-directory suffix describing these settings.
    pub fn description(&self) -> String {
        format!(
            "centroid_{}_sigma_{}_ngen_{}",
            self.centroid, self.sigma, self.ngen
        )
    }

    pub fn validate(&self) -> EtResult<()> {
        if !self.centroid.is_finite() {
            return Err(EtError::Validation(format!(
                "centroid must be finite, got {}",
                self.centroid
            )));
        }
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(EtError::Validation(format!(
                "sigma must be positive, got {}",
                self.sigma
            )));
        }
        if self.gen_size_factor == 0 {
            return Err(EtError::Validation(
                "gen_size_factor must be at least 1".to_string(),
            ));
        }
        if self.ngen == 0 {
            return Err(EtError::Validation("ngen must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl Default for EsParams {
    fn default() -> Self {
        Self::cart_pole_acrobot_best()
    }
}
