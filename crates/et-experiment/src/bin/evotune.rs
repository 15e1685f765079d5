use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use et_experiment::{Benchmark, BenchmarkFunction, CommandFitness, ExperimentConfig, TrainEs};
use et_types::{EsParams, FitnessTask};

#[derive(Debug, Parser)]
#[command(name = "evotune", version, about = "Tune policy parameters with CMA-ES")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one training experiment.
    Train(TrainArgs),
    /// Print the hyperparameters selected for a game.
    Params {
        #[arg(long)]
        game: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TaskKind {
    Sphere,
    Rastrigin,
    /// External program; see `--program`.
    Command,
}

#[derive(Debug, Args)]
struct TrainArgs {
    #[arg(long, value_enum, default_value_t = TaskKind::Sphere)]
    task: TaskKind,

    /// Game name reported by the task; drives the preset.
    #[arg(long)]
    game: Option<String>,

    /// Number of parameters in an individual.
    #[arg(long, default_value_t = 4)]
    dim: usize,

    /// Program scoring individuals for `--task command`.
    #[arg(long)]
    program: Option<PathBuf>,

    /// Argument passed to the program (repeatable).
    #[arg(long = "program-arg", allow_hyphen_values = true)]
    program_args: Vec<String>,

    /// JSON experiment config.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    logs_dir: Option<PathBuf>,

    /// Minimize the fitness instead of maximizing it.
    #[arg(long)]
    minimize: bool,

    #[arg(long)]
    seed: Option<u64>,

    /// Override the number of generations.
    #[arg(long)]
    ngen: Option<usize>,

    #[arg(long)]
    description: Option<String>,

    /// Extra file to copy into the run directory (repeatable).
    #[arg(long = "snapshot")]
    snapshot_files: Vec<PathBuf>,

    #[arg(long)]
    no_plot: bool,
}

fn build_task(args: &TrainArgs) -> anyhow::Result<Box<dyn FitnessTask>> {
    let task: Box<dyn FitnessTask> = match args.task {
        TaskKind::Sphere | TaskKind::Rastrigin => {
            let function = match args.task {
                TaskKind::Sphere => BenchmarkFunction::Sphere,
                _ => BenchmarkFunction::Rastrigin,
            };
            let mut benchmark = Benchmark::new(function, args.dim);
            if let Some(game) = &args.game {
                benchmark = benchmark.with_game_name(game.clone());
            }
            Box::new(benchmark)
        }
        TaskKind::Command => {
            let Some(program) = &args.program else {
                bail!("--task command needs --program");
            };
            let game = args.game.clone().unwrap_or_else(|| "External".to_string());
            Box::new(
                CommandFitness::new(program.clone(), game, args.dim)
                    .with_args(args.program_args.iter().cloned()),
            )
        }
    };
    Ok(task)
}

fn build_config(args: &TrainArgs, task: &dyn FitnessTask) -> anyhow::Result<ExperimentConfig> {
    let mut config = match &args.config {
        Some(path) => ExperimentConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ExperimentConfig::default(),
    }
    .apply_env();

    if let Some(dir) = &args.logs_dir {
        config = config.with_logs_dir(dir.clone());
    }
    if args.minimize {
        config = config.with_maximize(false);
    }
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if let Some(description) = &args.description {
        config = config.with_description(description.clone());
    }
    if let Some(ngen) = args.ngen {
        let params = config
            .params
            .clone()
            .unwrap_or_else(|| EsParams::for_game(task.game_name()))
            .with_ngen(ngen);
        config = config.with_params(params);
    }
    for path in &args.snapshot_files {
        config = config.with_snapshot_file(path.clone());
    }
    if let Some(path) = &args.config {
        config = config.with_snapshot_file(path.clone());
    }
    if args.no_plot {
        config = config.with_plot(false);
    }
    Ok(config)
}

fn train(args: TrainArgs) -> anyhow::Result<()> {
    let task = build_task(&args)?;
    let config = build_config(&args, task.as_ref())?;
    let trainer = TrainEs::new(task, config).context("setting up training")?;
    let outcome = trainer.train().context("training failed")?;

    println!("run directory: {}", outcome.run_dir.display());
    println!("{:.2}  seconds", outcome.elapsed.as_secs_f64());
    println!("hall of fame: {}", outcome.hall_of_fame);
    println!("final fitness: {}", outcome.final_fitness);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Train(args) => train(args),
        Commands::Params { game } => {
            let params = EsParams::for_game(&game);
            println!("{}", serde_json::to_string_pretty(&params)?);
            Ok(())
        }
    }
}
