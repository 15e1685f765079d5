//! The generate / evaluate / update loop.

use rayon::prelude::*;
use tracing::{debug, info};

use et_types::{EtResult, FitnessDirection, FitnessTask, Individual};

use crate::hall_of_fame::HallOfFame;
use crate::stats::{GenerationStats, Logbook};

/// An ask/tell style evolution strategy.
pub trait GenerateUpdate {
    /// Draw a new, unevaluated population.
    fn generate(&mut self) -> EtResult<Vec<Individual>>;

    /// Adapt the strategy from an evaluated population.
    fn update(&mut self, population: &[Individual], direction: FitnessDirection) -> EtResult<()>;
}

/// Evaluate every unevaluated individual in parallel. Returns the number of
/// evaluations performed. The first failing evaluation aborts the batch.
pub fn evaluate_population<F>(fitness: &F, population: &mut [Individual]) -> EtResult<usize>
where
    F: FitnessTask + ?Sized,
{
    population
        .par_iter_mut()
        .filter(|ind| !ind.is_evaluated())
        .map(|ind| -> EtResult<()> {
            let value = fitness.evaluate_checked(&ind.genes)?;
            ind.fitness = Some(value);
            Ok(())
        })
        .collect::<EtResult<Vec<()>>>()
        .map(|done| done.len())
}

/// Run `ngen` generations of generate, evaluate, record, update.
///
/// The hall of fame is refreshed and a statistics record is appended before
/// each strategy update. `on_generation` sees every record as it is produced.
/// Returns the last evaluated population along with the logbook.
pub fn ea_generate_update<S, F, O>(
    strategy: &mut S,
    fitness: &F,
    ngen: usize,
    direction: FitnessDirection,
    mut hall_of_fame: Option<&mut HallOfFame>,
    mut on_generation: O,
) -> EtResult<(Vec<Individual>, Logbook)>
where
    S: GenerateUpdate + ?Sized,
    F: FitnessTask + ?Sized,
    O: FnMut(&GenerationStats),
{
    let mut logbook = Logbook::new();
    let mut population = Vec::new();

    for gen in 0..ngen {
        population = strategy.generate()?;
        let nevals = evaluate_population(fitness, &mut population)?;

        if let Some(hof) = hall_of_fame.as_deref_mut() {
            hof.update(&population, direction);
        }

        let stats = GenerationStats::from_values(
            gen,
            nevals,
            &population
                .iter()
                .filter_map(|ind| ind.fitness)
                .collect::<Vec<_>>(),
        )?;
        on_generation(&stats);
        logbook.record(stats);

        strategy.update(&population, direction)?;
        debug!(gen, population = population.len(), "generation complete");
    }

    info!(
        generations = logbook.len(),
        evaluations = logbook.total_evaluations(),
        "generate-update loop finished"
    );
    Ok((population, logbook))
}
