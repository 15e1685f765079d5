//! Best-ever individuals across a run.

use serde::{Deserialize, Serialize};

use et_types::{FitnessDirection, Individual};

/// Keeps the `maxsize` best distinct individuals seen so far, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HallOfFame {
    maxsize: usize,
    items: Vec<Individual>,
}

impl HallOfFame {
    pub fn new(maxsize: usize) -> Self {
        Self {
            maxsize,
            items: Vec::with_capacity(maxsize),
        }
    }

    /// Offer every evaluated individual of `population` for a place.
    pub fn update(&mut self, population: &[Individual], direction: FitnessDirection) {
        if self.maxsize == 0 {
            return;
        }
        for candidate in population {
            let Some(fitness) = candidate.fitness else {
                continue;
            };
            let qualifies = match self.items.last().and_then(|worst| worst.fitness) {
                _ if self.items.len() < self.maxsize => true,
                Some(worst) => direction.is_better(fitness, worst),
                None => true,
            };
            if !qualifies || self.items.iter().any(|held| held.genes == candidate.genes) {
                continue;
            }
            if self.items.len() >= self.maxsize {
                self.items.pop();
            }
            // Insert after every held individual that is at least as good.
            let position = self
                .items
                .iter()
                .position(|held| {
                    held.fitness
                        .map_or(true, |held_fitness| direction.is_better(fitness, held_fitness))
                })
                .unwrap_or(self.items.len());
            self.items.insert(position, candidate.clone());
        }
    }

    pub fn best(&self) -> Option<&Individual> {
        self.items.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Individual> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn maxsize(&self) -> usize {
        self.maxsize
    }
}

impl std::fmt::Display for HallOfFame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, ind) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{ind}")?;
        }
        write!(f, "]")
    }
}
