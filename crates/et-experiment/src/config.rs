//! Experiment configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use et_types::{config_error, EtResult, EsParams, FitnessDirection};

/// Environment variable overriding [`ExperimentConfig::logs_dir`].
pub const LOGS_DIR_ENV: &str = "EVOTUNE_LOGS_DIR";

/// Seed used when none is configured.
pub const DEFAULT_SEED: u64 = 128;

/// Settings for one training run.
///
/// Every field has a default, so a config file only needs the keys it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Directory that holds one sub-directory per run.
    pub logs_dir: PathBuf,

    /// Run directory suffix. Defaults to [`EsParams::description`].
    pub description: Option<String>,

    /// Maximize (rewards) or minimize (costs) the fitness.
    pub maximize: bool,

    pub seed: u64,

    /// Hyperparameters to use instead of the game-based preset.
    pub params: Option<EsParams>,

    pub hall_of_fame_size: usize,

    /// Extra files copied into the run directory before training.
    pub snapshot_files: Vec<PathBuf>,

    /// Draw `fitness_graph.svg` at the end of the run.
    pub plot: bool,

    /// Plot width and height in pixels.
    pub plot_size: (u32, u32),
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            logs_dir: PathBuf::from("logs"),
            description: None,
            maximize: true,
            seed: DEFAULT_SEED,
            params: None,
            hall_of_fame_size: 1,
            snapshot_files: Vec::new(),
            plot: true,
            plot_size: (1024, 768),
        }
    }
}

impl ExperimentConfig {
    /// Load a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> EtResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| config_error!("cannot read {}: {}", path.display(), e))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| config_error!("cannot parse {}: {}", path.display(), e))?;
        debug!(path = %path.display(), "loaded experiment config");
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(LOGS_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.logs_dir = PathBuf::from(dir);
        }
        self
    }

    pub fn with_logs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.logs_dir = dir.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_maximize(mut self, maximize: bool) -> Self {
        self.maximize = maximize;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_params(mut self, params: EsParams) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_snapshot_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_files.push(path.into());
        self
    }

    pub fn with_plot(mut self, plot: bool) -> Self {
        self.plot = plot;
        self
    }

    pub fn direction(&self) -> FitnessDirection {
        FitnessDirection::from_maximize(self.maximize)
    }

    pub fn validate(&self) -> EtResult<()> {
        if self.logs_dir.as_os_str().is_empty() {
            return Err(config_error!("logs_dir must not be empty"));
        }
        if self.hall_of_fame_size == 0 {
            return Err(config_error!("hall_of_fame_size must be at least 1"));
        }
        if self.plot && (self.plot_size.0 == 0 || self.plot_size.1 == 0) {
            return Err(config_error!(
                "plot_size must be non-zero, got {:?}",
                self.plot_size
            ));
        }
        if let Some(description) = &self.description {
            if description.contains(['/', '\\']) {
                return Err(config_error!(
                    "description must not contain path separators: {description}"
                ));
            }
        }
        if let Some(params) = &self.params {
            params.validate()?;
        }
        Ok(())
    }
}
