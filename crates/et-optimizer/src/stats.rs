//! Per-generation fitness statistics and the run logbook.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use et_types::{EtError, EtResult, Individual, OptimizerError};

/// Fitness summary of one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub gen: usize,
    pub nevals: usize,
    pub avg: f64,
    /// Population standard deviation.
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl GenerationStats {
    /// Summarize the fitness of an evaluated population.
    pub fn from_population(gen: usize, population: &[Individual]) -> EtResult<Self> {
        let mut values = Vec::with_capacity(population.len());
        for (index, ind) in population.iter().enumerate() {
            values.push(ind.fitness.ok_or(OptimizerError::Unevaluated { index })?);
        }
        Self::from_values(gen, population.len(), &values)
    }

    pub fn from_values(gen: usize, nevals: usize, values: &[f64]) -> EtResult<Self> {
        if values.is_empty() {
            return Err(OptimizerError::EmptyPopulation.into());
        }
        let n = values.len() as f64;
        let avg = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / n;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Ok(Self {
            gen,
            nevals,
            avg,
            std: variance.sqrt(),
            min,
            max,
        })
    }
}

/// Ordered statistics records of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Logbook {
    records: Vec<GenerationStats>,
}

impl Logbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stats: GenerationStats) {
        self.records.push(stats);
    }

    pub fn records(&self) -> &[GenerationStats] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &GenerationStats> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&GenerationStats> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn avg(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.avg).collect()
    }

    pub fn std(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.std).collect()
    }

    pub fn min(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.min).collect()
    }

    pub fn max(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.max).collect()
    }

    /// Total evaluations across all generations.
    pub fn total_evaluations(&self) -> usize {
        self.records.iter().map(|r| r.nevals).sum()
    }

    /// Header line of the text table.
    pub fn header() -> String {
        format!(
            "{:<6}{:<8}{:<14}{:<14}{:<14}{:<14}",
            "gen", "nevals", "Avg", "Std", "Min", "Max"
        )
    }

    /// One text-table row.
    pub fn format_row(stats: &GenerationStats) -> String {
        format!(
            "{:<6}{:<8}{:<14.6}{:<14.6}{:<14.6}{:<14.6}",
            stats.gen, stats.nevals, stats.avg, stats.std, stats.min, stats.max
        )
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> EtResult<()> {
        let mut writer =
            csv::Writer::from_path(path.as_ref()).map_err(|e| EtError::Csv(e.to_string()))?;
        for record in &self.records {
            writer
                .serialize(record)
                .map_err(|e| EtError::Csv(e.to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read_csv<P: AsRef<Path>>(path: P) -> EtResult<Self> {
        let mut reader =
            csv::Reader::from_path(path.as_ref()).map_err(|e| EtError::Csv(e.to_string()))?;
        let mut logbook = Self::new();
        for row in reader.deserialize() {
            let record: GenerationStats = row.map_err(|e| EtError::Csv(e.to_string()))?;
            logbook.record(record);
        }
        Ok(logbook)
    }
}

impl fmt::Display for Logbook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", Self::header().trim_end())?;
        for record in &self.records {
            writeln!(f, "{}", Self::format_row(record).trim_end())?;
        }
        Ok(())
    }
}
