use serde::{Deserialize, Serialize};

/// One candidate parameter vector and, once scored, its fitness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    pub genes: Vec<f64>,
    pub fitness: Option<f64>,
}

impl Individual {
    pub fn new(genes: Vec<f64>) -> Self {
        Self {
            genes,
            fitness: None,
        }
    }

    pub fn with_fitness(mut self, fitness: f64) -> Self {
        self.fitness = Some(fitness);
        self
    }

    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some()
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }
}

impl std::fmt::Display for Individual {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, gene) in self.genes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{gene}")?;
        }
        write!(f, "]")
    }
}
