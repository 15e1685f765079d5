//! Covariance matrix adaptation evolution strategy.
//!
//! A (mu/mu_w, lambda) CMA-ES with superlinear recombination weights,
//! cumulative step-size adaptation and rank-one plus rank-mu covariance
//! updates. The strategy never evaluates anything itself: callers draw a
//! population with [`CmaStrategy::generate`], score it, and hand it back to
//! [`CmaStrategy::update`].

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use et_types::{EtError, EtResult, FitnessDirection, Individual, OptimizerError};

use crate::algorithm::GenerateUpdate;

/// Construction options for a [`CmaStrategy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmaOptions {
    /// Initial mean of the search distribution.
    pub centroid: Vec<f64>,
    /// Initial step size.
    pub sigma: f64,
    /// Offspring per generation; `None` picks `4 + floor(3 ln n)`.
    pub lambda: Option<usize>,
    /// Seed for the sampling RNG.
    pub seed: u64,
}

impl CmaOptions {
    pub fn new(centroid: Vec<f64>, sigma: f64) -> Self {
        Self {
            centroid,
            sigma,
            lambda: None,
            seed: 0,
        }
    }

    pub fn with_lambda(mut self, lambda: usize) -> Self {
        self.lambda = Some(lambda);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Default offspring count for a problem of dimension `dim`.
pub fn default_lambda(dim: usize) -> usize {
    4 + (3.0 * (dim as f64).ln()).floor() as usize
}

/// CMA-ES search state.
#[derive(Debug, Clone)]
pub struct CmaStrategy {
    dim: usize,
    lambda: usize,
    mu: usize,
    weights: DVector<f64>,
    mueff: f64,

    cc: f64,
    cs: f64,
    ccov1: f64,
    ccovmu: f64,
    damps: f64,
    chi_n: f64,

    centroid: DVector<f64>,
    sigma: f64,
    pc: DVector<f64>,
    ps: DVector<f64>,
    c: DMatrix<f64>,
    b: DMatrix<f64>,
    diag_d: DVector<f64>,
    bd: DMatrix<f64>,
    cond: f64,
    update_count: usize,

    rng: ChaCha8Rng,
}

impl CmaStrategy {
    pub fn new(options: CmaOptions) -> EtResult<Self> {
        let dim = options.centroid.len();
        if dim == 0 {
            return Err(EtError::Validation(
                "CMA-ES centroid must have at least one dimension".to_string(),
            ));
        }
        if options.centroid.iter().any(|v| !v.is_finite()) {
            return Err(EtError::Validation(
                "CMA-ES centroid must be finite".to_string(),
            ));
        }
        if !(options.sigma.is_finite() && options.sigma > 0.0) {
            return Err(EtError::Validation(format!(
                "CMA-ES sigma must be positive, got {}",
                options.sigma
            )));
        }

        let lambda = options.lambda.unwrap_or_else(|| default_lambda(dim));
        if lambda < 2 {
            return Err(EtError::Validation(format!(
                "CMA-ES needs at least 2 offspring per generation, got {lambda}"
            )));
        }
        let mu = lambda / 2;

        // Superlinear recombination weights.
        let raw: Vec<f64> = (1..=mu)
            .map(|i| (mu as f64 + 0.5).ln() - (i as f64).ln())
            .collect();
        let total: f64 = raw.iter().sum();
        let weights = DVector::from_iterator(mu, raw.into_iter().map(|w| w / total));
        let mueff = 1.0 / weights.iter().map(|w| w * w).sum::<f64>();

        let n = dim as f64;
        let cc = 4.0 / (n + 4.0);
        let cs = (mueff + 2.0) / (n + mueff + 3.0);
        let ccov1 = 2.0 / ((n + 1.3).powi(2) + mueff);
        let ccovmu = (2.0 * (mueff - 2.0 + 1.0 / mueff) / ((n + 2.0).powi(2) + mueff))
            .min(1.0 - ccov1);
        let damps = 1.0 + 2.0 * (((mueff - 1.0) / (n + 1.0)).sqrt() - 1.0).max(0.0) + cs;
        let chi_n = n.sqrt() * (1.0 - 1.0 / (4.0 * n) + 1.0 / (21.0 * n * n));

        debug!(
            dim,
            lambda, mu, mueff, cc, cs, ccov1, ccovmu, damps, "CMA-ES strategy parameters"
        );

        Ok(Self {
            dim,
            lambda,
            mu,
            weights,
            mueff,
            cc,
            cs,
            ccov1,
            ccovmu,
            damps,
            chi_n,
            centroid: DVector::from_vec(options.centroid),
            sigma: options.sigma,
            pc: DVector::zeros(dim),
            ps: DVector::zeros(dim),
            c: DMatrix::identity(dim, dim),
            b: DMatrix::identity(dim, dim),
            diag_d: DVector::from_element(dim, 1.0),
            bd: DMatrix::identity(dim, dim),
            cond: 1.0,
            update_count: 0,
            rng: ChaCha8Rng::seed_from_u64(options.seed),
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn lambda(&self) -> usize {
        self.lambda
    }

    pub fn mu(&self) -> usize {
        self.mu
    }

    pub fn mueff(&self) -> f64 {
        self.mueff
    }

    pub fn weights(&self) -> &[f64] {
        self.weights.as_slice()
    }

    pub fn centroid(&self) -> &[f64] {
        self.centroid.as_slice()
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Condition number of the covariance matrix.
    pub fn cond(&self) -> f64 {
        self.cond
    }

    pub fn update_count(&self) -> usize {
        self.update_count
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.c
    }

    /// Sample `lambda` new individuals around the current centroid.
    pub fn generate(&mut self) -> Vec<Individual> {
        (0..self.lambda)
            .map(|_| {
                let z = DVector::from_fn(self.dim, |_, _| self.rng.sample::<f64, _>(StandardNormal));
                let x = &self.centroid + (&self.bd * z) * self.sigma;
                Individual::new(x.iter().copied().collect())
            })
            .collect()
    }

    /// Move the search distribution toward the best individuals of an
    /// evaluated population.
    pub fn update(
        &mut self,
        population: &[Individual],
        direction: FitnessDirection,
    ) -> EtResult<()> {
        if population.is_empty() {
            return Err(OptimizerError::EmptyPopulation.into());
        }
        if population.len() < self.mu {
            return Err(OptimizerError::PopulationTooSmall {
                size: population.len(),
                mu: self.mu,
            }
            .into());
        }
        let mut ranked = Vec::with_capacity(population.len());
        for (index, ind) in population.iter().enumerate() {
            if ind.genes.len() != self.dim {
                return Err(OptimizerError::DimensionMismatch {
                    expected: self.dim,
                    actual: ind.genes.len(),
                }
                .into());
            }
            let fitness = ind
                .fitness
                .ok_or(OptimizerError::Unevaluated { index })?;
            ranked.push((fitness, ind));
        }
        ranked.sort_by(|a, b| direction.best_first(a.0, b.0));

        let parents: Vec<DVector<f64>> = ranked[..self.mu]
            .iter()
            .map(|(_, ind)| DVector::from_column_slice(&ind.genes))
            .collect();

        let old_centroid = self.centroid.clone();
        let mut centroid: DVector<f64> = DVector::zeros(self.dim);
        for (w, x) in self.weights.iter().zip(&parents) {
            centroid += x * *w;
        }
        self.centroid = centroid;
        let c_diff = &self.centroid - &old_centroid;

        // Step-size evolution path, measured in the whitened space.
        let whitened = self.b.transpose() * &c_diff;
        let scaled = whitened.component_div(&self.diag_d);
        self.ps = &self.ps * (1.0 - self.cs)
            + (&self.b * scaled) * ((self.cs * (2.0 - self.cs) * self.mueff).sqrt() / self.sigma);

        let ps_norm = self.ps.norm();
        let correction = (1.0 - (1.0 - self.cs).powi(2 * (self.update_count as i32 + 1))).sqrt();
        let hsig = if ps_norm / correction / self.chi_n < 1.4 + 2.0 / (self.dim as f64 + 1.0) {
            1.0
        } else {
            0.0
        };
        self.update_count += 1;

        self.pc = &self.pc * (1.0 - self.cc)
            + &c_diff * (hsig * (self.cc * (2.0 - self.cc) * self.mueff).sqrt() / self.sigma);

        let mut rank_mu: DMatrix<f64> = DMatrix::zeros(self.dim, self.dim);
        for (w, x) in self.weights.iter().zip(&parents) {
            let step = x - &old_centroid;
            rank_mu += (&step * step.transpose()) * *w;
        }

        let keep = 1.0 - self.ccov1 - self.ccovmu
            + (1.0 - hsig) * self.ccov1 * self.cc * (2.0 - self.cc);
        self.c = &self.c * keep
            + (&self.pc * self.pc.transpose()) * self.ccov1
            + rank_mu * (self.ccovmu / (self.sigma * self.sigma));

        self.sigma *= ((ps_norm / self.chi_n - 1.0) * self.cs / self.damps).exp();
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(OptimizerError::NumericalBreakdown {
                message: format!("step size became {}", self.sigma),
            }
            .into());
        }

        self.decompose()?;
        debug!(
            update = self.update_count,
            sigma = self.sigma,
            cond = self.cond,
            hsig,
            "CMA-ES update"
        );
        Ok(())
    }

    /// Recompute `B`, `D` and `BD` from the covariance matrix.
    fn decompose(&mut self) -> EtResult<()> {
        let symmetric = (&self.c + self.c.transpose()) * 0.5;
        if symmetric.iter().any(|v| !v.is_finite()) {
            return Err(OptimizerError::NumericalBreakdown {
                message: "covariance matrix has non-finite entries".to_string(),
            }
            .into());
        }
        self.c = symmetric;

        let eigen = SymmetricEigen::new(self.c.clone());
        let mut order: Vec<usize> = (0..self.dim).collect();
        order.sort_by(|&a, &b| {
            eigen.eigenvalues[a]
                .partial_cmp(&eigen.eigenvalues[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let largest = eigen.eigenvalues[order[self.dim - 1]];
        if !(largest.is_finite() && largest > 0.0) {
            return Err(OptimizerError::NumericalBreakdown {
                message: format!("largest covariance eigenvalue is {largest}"),
            }
            .into());
        }
        // Round-off can push the smallest eigenvalues just below zero.
        let floor = largest * 1e-20;
        let eigenvalues: Vec<f64> = order
            .iter()
            .map(|&i| eigen.eigenvalues[i].max(floor))
            .collect();

        self.cond = eigenvalues[self.dim - 1] / eigenvalues[0];
        self.diag_d = DVector::from_iterator(self.dim, eigenvalues.iter().map(|v| v.sqrt()));

        let mut b: DMatrix<f64> = DMatrix::zeros(self.dim, self.dim);
        for (target, &source) in order.iter().enumerate() {
            b.set_column(target, &eigen.eigenvectors.column(source));
        }
        let mut bd = b.clone();
        for (j, d) in self.diag_d.iter().enumerate() {
            bd.column_mut(j).scale_mut(*d);
        }
        self.b = b;
        self.bd = bd;
        Ok(())
    }
}

impl GenerateUpdate for CmaStrategy {
    fn generate(&mut self) -> EtResult<Vec<Individual>> {
        Ok(CmaStrategy::generate(self))
    }

    fn update(&mut self, population: &[Individual], direction: FitnessDirection) -> EtResult<()> {
        CmaStrategy::update(self, population, direction)
    }
}
