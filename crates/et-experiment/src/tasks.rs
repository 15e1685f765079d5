//! Built-in fitness tasks.
//!
//! Policy evaluation lives outside this crate. [`CommandFitness`] reaches it
//! through a child process; [`Benchmark`] stands in for it with analytic
//! functions so a run can be smoke-tested without an environment.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::trace;

use et_types::{EtResult, FitnessError, FitnessTask};

/// Analytic test functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchmarkFunction {
    Sphere,
    Rastrigin,
}

impl BenchmarkFunction {
    pub fn parse(name: &str) -> EtResult<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sphere" => Ok(Self::Sphere),
            "rastrigin" => Ok(Self::Rastrigin),
            _ => Err(FitnessError::UnknownTask {
                name: name.to_string(),
            }
            .into()),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Sphere => "Sphere",
            Self::Rastrigin => "Rastrigin",
        }
    }

    /// Function value; zero at the origin, positive elsewhere.
    pub fn value(self, x: &[f64]) -> f64 {
        match self {
            Self::Sphere => x.iter().map(|v| v * v).sum(),
            Self::Rastrigin => {
                10.0 * x.len() as f64
                    + x.iter()
                        .map(|v| v * v - 10.0 * (2.0 * std::f64::consts::PI * v).cos())
                        .sum::<f64>()
            }
        }
    }
}

/// Benchmark function scored as a reward: the negated function value, so
/// maximizing drives the individual toward the origin.
#[derive(Debug, Clone)]
pub struct Benchmark {
    function: BenchmarkFunction,
    dim: usize,
    game_name: String,
}

impl Benchmark {
    pub fn new(function: BenchmarkFunction, dim: usize) -> Self {
        Self {
            function,
            dim,
            game_name: function.name().to_string(),
        }
    }

    /// Report a different game name, e.g. to pick another preset.
    pub fn with_game_name(mut self, game_name: impl Into<String>) -> Self {
        self.game_name = game_name.into();
        self
    }

    pub fn function(&self) -> BenchmarkFunction {
        self.function
    }
}

impl FitnessTask for Benchmark {
    fn kind(&self) -> &str {
        "Benchmark"
    }

    fn game_name(&self) -> &str {
        &self.game_name
    }

    fn num_features(&self) -> usize {
        self.dim
    }

    fn evaluate(&self, genes: &[f64]) -> EtResult<f64> {
        Ok(-self.function.value(genes))
    }
}

/// Fitness computed by an external program.
///
/// For each evaluation the program is spawned, receives the genes as a JSON
/// array followed by a newline on stdin, and must print the fitness as the
/// last non-empty line of stdout and exit with status 0.
#[derive(Debug, Clone)]
pub struct CommandFitness {
    program: PathBuf,
    args: Vec<String>,
    game_name: String,
    num_features: usize,
}

impl CommandFitness {
    pub fn new(
        program: impl Into<PathBuf>,
        game_name: impl Into<String>,
        num_features: usize,
    ) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            game_name: game_name.into(),
            num_features,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn failure(&self, message: impl Into<String>) -> FitnessError {
        FitnessError::CommandFailed {
            command: self.program.display().to_string(),
            message: message.into(),
        }
    }
}

impl FitnessTask for CommandFitness {
    fn kind(&self) -> &str {
        "CommandFitness"
    }

    fn game_name(&self) -> &str {
        &self.game_name
    }

    fn num_features(&self) -> usize {
        self.num_features
    }

    fn evaluate(&self, genes: &[f64]) -> EtResult<f64> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.failure(format!("spawn failed: {e}")))?;

        let payload = format!("{}\n", serde_json::to_string(genes)?);
        if let Some(mut stdin) = child.stdin.take() {
            // The program may exit without reading its input.
            if let Err(e) = stdin.write_all(payload.as_bytes()) {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(self.failure(format!("writing genes: {e}")).into());
                }
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| self.failure(format!("wait failed: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self
                .failure(format!("exited with {}: {}", output.status, stderr.trim()))
                .into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or_else(|| self.failure("no output"))?;
        let value: f64 = line
            .parse()
            .map_err(|_| self.failure(format!("cannot parse fitness from {line:?}")))?;
        trace!(value, "external evaluation");
        Ok(value)
    }

    fn source_files(&self) -> Vec<PathBuf> {
        if self.program.is_file() {
            vec![self.program.clone()]
        } else {
            Vec::new()
        }
    }
}
