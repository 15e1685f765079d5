use std::fs;
use std::path::PathBuf;

use et_experiment::run_dir::{
    CONFIG_FILE, FINAL_MODEL_FILE, FITNESS_GRAPH_FILE, LOGBOOK_FILE, PARAMS_FILE, SUMMARY_FILE,
    TIME_TO_TRAIN_FILE,
};
use et_experiment::{Benchmark, BenchmarkFunction, ExperimentConfig, RunSummary, TrainEs};
use et_optimizer::Logbook;
use et_types::{EsParams, EtError, EtResult, ExperimentError, FitnessDirection, FitnessTask};
use tempfile::tempdir;

fn quick_params() -> EsParams {
    EsParams {
        centroid: 5.0,
        sigma: 5.0,
        gen_size_factor: 10,
        ngen: 40,
    }
}

#[test]
fn training_writes_all_artifacts() {
    let root = tempdir().unwrap();
    let notes = root.path().join("GameFitness.json");
    fs::write(&notes, r#"{"episodes": 3}"#).unwrap();

    let config = ExperimentConfig::default()
        .with_logs_dir(root.path().join("logs"))
        .with_params(quick_params())
        .with_snapshot_file(&notes)
        .with_plot(false);
    let task = Benchmark::new(BenchmarkFunction::Sphere, 3).with_game_name("CartPole-v1");
    let trainer = TrainEs::new(task, config).unwrap();
    let outcome = trainer.train().unwrap();

    let dir_name = outcome.run_dir.file_name().unwrap().to_string_lossy().to_string();
    assert!(dir_name.starts_with("Benchmark_CartPole-v1_"), "{dir_name}");
    assert!(dir_name.ends_with("-centroid_5_sigma_5_ngen_40"), "{dir_name}");
    assert_eq!(outcome.run_dir.parent().unwrap(), root.path().join("logs"));

    // Snapshot and params.
    assert_eq!(
        fs::read_to_string(outcome.run_dir.join("GameFitness.json")).unwrap(),
        r#"{"episodes": 3}"#
    );
    let params: EsParams =
        serde_json::from_str(&fs::read_to_string(outcome.run_dir.join(PARAMS_FILE)).unwrap())
            .unwrap();
    assert_eq!(params, quick_params());

    // The settings the run used, including the resolved description.
    let used: ExperimentConfig =
        serde_json::from_str(&fs::read_to_string(outcome.run_dir.join(CONFIG_FILE)).unwrap())
            .unwrap();
    assert_eq!(used.params, Some(quick_params()));
    assert_eq!(used.description.as_deref(), Some("centroid_5_sigma_5_ngen_40"));
    assert_eq!(used.snapshot_files, vec![notes.clone()]);
    assert!(!used.plot);

    // Final model is the hall-of-fame best and scores the reported fitness.
    let model: Vec<f64> =
        serde_json::from_str(&fs::read_to_string(outcome.run_dir.join(FINAL_MODEL_FILE)).unwrap())
            .unwrap();
    assert_eq!(model.len(), 3);
    assert_eq!(Some(model.as_slice()), outcome.best_genes());
    let expected = -model.iter().map(|v| v * v).sum::<f64>();
    assert!((outcome.final_fitness - expected).abs() < 1e-12);

    let timing = fs::read_to_string(outcome.run_dir.join(TIME_TO_TRAIN_FILE)).unwrap();
    assert!(timing.ends_with("  seconds"), "{timing}");

    // One logbook row per generation, 30 evaluations each.
    let logbook = Logbook::read_csv(outcome.run_dir.join(LOGBOOK_FILE)).unwrap();
    assert_eq!(logbook.len(), 40);
    assert!(logbook.iter().all(|r| r.nevals == 30));
    assert_eq!(logbook, outcome.logbook);

    // Maximizing the negated sphere moves toward the origin.
    let first_max = logbook.records()[0].max;
    assert!(outcome.final_fitness > first_max);

    let summary: RunSummary =
        serde_json::from_str(&fs::read_to_string(outcome.run_dir.join(SUMMARY_FILE)).unwrap())
            .unwrap();
    assert_eq!(summary.generations, 40);
    assert_eq!(summary.evaluations, 1200);
    assert_eq!(summary.direction, FitnessDirection::Maximize);
    assert_eq!(summary.seed, 128);
    assert_eq!(summary.best_fitness, Some(outcome.final_fitness));

    assert!(!outcome.run_dir.join(FITNESS_GRAPH_FILE).exists());
}

#[test]
fn same_seed_reproduces_run() {
    let run = |seed: u64| {
        let root = tempdir().unwrap();
        let config = ExperimentConfig::default()
            .with_logs_dir(root.path())
            .with_params(quick_params().with_ngen(10))
            .with_seed(seed)
            .with_plot(false);
        let trainer = TrainEs::new(Benchmark::new(BenchmarkFunction::Rastrigin, 2), config).unwrap();
        trainer.train().unwrap().logbook
    };
    assert_eq!(run(7), run(7));
    assert_ne!(run(7), run(8));
}

#[test]
fn minimizing_tracks_lowest_fitness() {
    let root = tempdir().unwrap();
    let config = ExperimentConfig::default()
        .with_logs_dir(root.path())
        .with_params(quick_params().with_ngen(5))
        .with_maximize(false)
        .with_description("minimize")
        .with_plot(false);
    let trainer = TrainEs::new(Benchmark::new(BenchmarkFunction::Sphere, 2), config).unwrap();
    let outcome = trainer.train().unwrap();

    let lowest = outcome
        .logbook
        .iter()
        .map(|r| r.min)
        .fold(f64::INFINITY, f64::min);
    assert_eq!(outcome.final_fitness, lowest);
    assert_eq!(outcome.summary.direction, FitnessDirection::Minimize);
    assert!(outcome.run_dir.to_string_lossy().ends_with("-minimize"));
}

#[test]
fn missing_snapshot_aborts_before_training() {
    let root = tempdir().unwrap();
    let config = ExperimentConfig::default()
        .with_logs_dir(root.path())
        .with_params(quick_params())
        .with_snapshot_file(root.path().join("TrainEs.py"))
        .with_plot(false);
    let trainer = TrainEs::new(Benchmark::new(BenchmarkFunction::Sphere, 2), config).unwrap();
    let err = trainer.train().unwrap_err();
    assert!(matches!(
        err,
        EtError::Experiment(ExperimentError::MissingSource { .. })
    ));
}

#[test]
fn default_run_records_config_and_graph() {
    let root = tempdir().unwrap();
    let config = ExperimentConfig::default()
        .with_logs_dir(root.path())
        .with_params(quick_params().with_ngen(5));
    let trainer = TrainEs::new(Benchmark::new(BenchmarkFunction::Sphere, 2), config).unwrap();
    let outcome = trainer.train().unwrap();

    assert!(outcome.run_dir.join(CONFIG_FILE).is_file());
    let svg = fs::read_to_string(outcome.run_dir.join(FITNESS_GRAPH_FILE)).unwrap();
    assert!(svg.contains("<svg"));
}

/// Sphere task that blocks the graph path of every run under `logs_dir`
/// with a directory while it is being evaluated.
struct GraphBlocker {
    logs_dir: PathBuf,
}

impl FitnessTask for GraphBlocker {
    fn kind(&self) -> &str {
        "Benchmark"
    }

    fn game_name(&self) -> &str {
        "Sphere"
    }

    fn num_features(&self) -> usize {
        2
    }

    fn evaluate(&self, genes: &[f64]) -> EtResult<f64> {
        for entry in fs::read_dir(&self.logs_dir)? {
            let _ = fs::create_dir_all(entry?.path().join(FITNESS_GRAPH_FILE));
        }
        Ok(-genes.iter().map(|g| g * g).sum::<f64>())
    }
}

#[test]
fn plot_failure_does_not_fail_run() {
    let root = tempdir().unwrap();
    let config = ExperimentConfig::default()
        .with_logs_dir(root.path())
        .with_params(quick_params().with_ngen(3));
    let task = GraphBlocker {
        logs_dir: root.path().to_path_buf(),
    };
    let trainer = TrainEs::new(task, config).unwrap();
    let outcome = trainer.train().unwrap();

    assert!(outcome.run_dir.join(FITNESS_GRAPH_FILE).is_dir());
    assert!(outcome.run_dir.join(FINAL_MODEL_FILE).is_file());
    assert_eq!(outcome.logbook.len(), 3);
}
