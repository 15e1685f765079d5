//! Training orchestration: preset selection, run bookkeeping and the
//! CMA-ES run itself.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{Local, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use et_optimizer::{ea_generate_update, CmaOptions, CmaStrategy, HallOfFame, Logbook};
use et_types::{
    validation_error, EsParams, EtResult, ExperimentError, FitnessDirection, FitnessTask,
};

use crate::config::ExperimentConfig;
use crate::plot::plot_fitness;
use crate::run_dir::{
    check_path_component, format_elapsed, run_directory_name, RunDirectory, RunSummary,
    FITNESS_GRAPH_FILE,
};

/// Everything a finished training run produced.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub run_dir: PathBuf,
    pub params: EsParams,
    pub logbook: Logbook,
    pub hall_of_fame: HallOfFame,
    /// Fitness of the best individual, evaluated once more after training.
    pub final_fitness: f64,
    pub elapsed: Duration,
    pub summary: RunSummary,
}

impl TrainOutcome {
    pub fn best_genes(&self) -> Option<&[f64]> {
        self.hall_of_fame.best().map(|ind| ind.genes.as_slice())
    }
}

/// Trains a flat parameter vector for a [`FitnessTask`] with CMA-ES and
/// keeps a log directory per run.
#[derive(Debug)]
pub struct TrainEs<F: FitnessTask> {
    fitness: F,
    config: ExperimentConfig,
    params: EsParams,
}

impl<F: FitnessTask> TrainEs<F> {
    pub fn new(fitness: F, config: ExperimentConfig) -> EtResult<Self> {
        config.validate()?;
        check_path_component("task kind", fitness.kind())?;
        check_path_component("game name", fitness.game_name())?;
        if fitness.num_features() == 0 {
            return Err(validation_error!(
                "fitness task {} declares no features",
                fitness.kind()
            ));
        }
        let params = match &config.params {
            Some(params) => params.clone(),
            None => EsParams::for_game(fitness.game_name()),
        };
        params.validate()?;
        if params.population_size(fitness.num_features()) < 2 {
            return Err(validation_error!(
                "population of {} is too small for CMA-ES",
                params.population_size(fitness.num_features())
            ));
        }

        info!(
            kind = fitness.kind(),
            game = fitness.game_name(),
            features = fitness.num_features(),
            ?params,
            "training setup"
        );
        Ok(Self {
            fitness,
            config,
            params,
        })
    }

    pub fn params(&self) -> &EsParams {
        &self.params
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn fitness(&self) -> &F {
        &self.fitness
    }

    /// Run directory suffix for this trainer.
    pub fn description(&self) -> String {
        self.config
            .description
            .clone()
            .unwrap_or_else(|| self.params.description())
    }

    /// The config with the selected params and description filled in.
    pub fn resolved_config(&self) -> ExperimentConfig {
        self.config
            .clone()
            .with_params(self.params.clone())
            .with_description(self.description())
    }

    /// Train in the configured direction.
    pub fn train(&self) -> EtResult<TrainOutcome> {
        self.train_with_direction(self.config.direction())
    }

    pub fn train_with_direction(&self, direction: FitnessDirection) -> EtResult<TrainOutcome> {
        let num_features = self.fitness.num_features();
        let started_at = Utc::now();

        let name = run_directory_name(
            self.fitness.kind(),
            self.fitness.game_name(),
            Local::now().naive_local(),
            &self.description(),
        );
        let run_dir = RunDirectory::create(&self.config.logs_dir, &name)?;

        let mut sources = self.config.snapshot_files.clone();
        sources.extend(self.fitness.source_files());
        run_dir.snapshot_sources(&sources)?;
        run_dir.write_params(&self.params)?;
        run_dir.write_config(&self.resolved_config())?;

        let options = CmaOptions::new(self.params.initial_centroid(num_features), self.params.sigma)
            .with_lambda(self.params.population_size(num_features))
            .with_seed(self.config.seed);
        let mut strategy = CmaStrategy::new(options)?;
        let mut hall_of_fame = HallOfFame::new(self.config.hall_of_fame_size);

        info!("{}", Logbook::header().trim_end());
        let start = Instant::now();
        let (_, logbook) = ea_generate_update(
            &mut strategy,
            &self.fitness,
            self.params.ngen,
            direction,
            Some(&mut hall_of_fame),
            |stats| info!("{}", Logbook::format_row(stats).trim_end()),
        )?;
        let elapsed = start.elapsed();
        info!("{}", format_elapsed(elapsed));
        info!("hall of fame: {hall_of_fame}");

        let best = hall_of_fame.best().ok_or(ExperimentError::NoResult)?;
        let final_fitness = self.fitness.evaluate_checked(&best.genes)?;
        info!("final fitness: {final_fitness}");

        run_dir.write_final_model(&best.genes)?;
        run_dir.write_time_to_train(elapsed)?;
        run_dir.write_logbook(&logbook)?;

        let summary = RunSummary {
            run_id: Uuid::new_v4(),
            kind: self.fitness.kind().to_string(),
            game: self.fitness.game_name().to_string(),
            num_features,
            params: self.params.clone(),
            direction,
            seed: self.config.seed,
            generations: logbook.len(),
            evaluations: logbook.total_evaluations(),
            best_fitness: best.fitness,
            final_fitness,
            elapsed_seconds: elapsed.as_secs_f64(),
            started_at,
            finished_at: Utc::now(),
        };
        run_dir.write_summary(&summary)?;

        if self.config.plot {
            let graph = run_dir.artifact(FITNESS_GRAPH_FILE);
            match plot_fitness(&logbook, &graph, self.config.plot_size) {
                Ok(()) => info!(path = %graph.display(), "fitness graph saved"),
                Err(e) => warn!(error = %e, "could not draw fitness graph"),
            }
        }

        Ok(TrainOutcome {
            run_dir: run_dir.path().to_path_buf(),
            params: self.params.clone(),
            logbook,
            hall_of_fame,
            final_fitness,
            elapsed,
            summary,
        })
    }
}
