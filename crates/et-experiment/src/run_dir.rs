//! Per-run artifact directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use et_optimizer::Logbook;
use et_types::{validation_error, EsParams, EtResult, ExperimentError, FitnessDirection};

use crate::config::ExperimentConfig;

pub const PARAMS_FILE: &str = "params.txt";
pub const CONFIG_FILE: &str = "config.json";
pub const FINAL_MODEL_FILE: &str = "final_model.txt";
pub const TIME_TO_TRAIN_FILE: &str = "time_to_train.txt";
pub const LOGBOOK_FILE: &str = "logbook.csv";
pub const SUMMARY_FILE: &str = "run.json";
pub const FITNESS_GRAPH_FILE: &str = "fitness_graph.svg";

/// `{kind}_{game}_{YYYY-mm-dd-HH-MM-}{description}`
pub fn run_directory_name(
    kind: &str,
    game: &str,
    timestamp: NaiveDateTime,
    description: &str,
) -> String {
    format!(
        "{kind}_{game}{}{description}",
        timestamp.format("_%Y-%m-%d-%H-%M-")
    )
}

/// Reject values that would not stay a single directory name component.
pub fn check_path_component(label: &str, value: &str) -> EtResult<()> {
    if value.is_empty() || value.contains(['/', '\\']) || value == "." || value == ".." {
        return Err(validation_error!(
            "{label} {value:?} cannot be used in a run directory name"
        ));
    }
    Ok(())
}

/// Elapsed time the way it is written to `time_to_train.txt`.
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.2}  seconds", elapsed.as_secs_f64())
}

/// Machine-readable record of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub kind: String,
    pub game: String,
    pub num_features: usize,
    pub params: EsParams,
    pub direction: FitnessDirection,
    pub seed: u64,
    pub generations: usize,
    pub evaluations: usize,
    pub best_fitness: Option<f64>,
    pub final_fitness: f64,
    pub elapsed_seconds: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// A created run directory and the writers for its artifacts.
#[derive(Debug, Clone)]
pub struct RunDirectory {
    path: PathBuf,
}

impl RunDirectory {
    /// Create `logs_dir/name`. `logs_dir` is created if missing; the run
    /// directory itself must not exist yet.
    pub fn create<P: AsRef<Path>>(logs_dir: P, name: &str) -> EtResult<Self> {
        let logs_dir = logs_dir.as_ref();
        check_path_component("run directory name", name)?;
        fs::create_dir_all(logs_dir)?;

        let path = logs_dir.join(name);
        if path.exists() {
            return Err(ExperimentError::RunDirectoryExists { path }.into());
        }
        fs::create_dir(&path)?;
        info!(path = %path.display(), "created run directory");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn artifact(&self, file_name: &str) -> PathBuf {
        self.path.join(file_name)
    }

    /// Copy each source file into the run directory under its file name.
    ///
    /// A source listed twice is copied once; two different sources sharing a
    /// file name are an error.
    pub fn snapshot_sources(&self, sources: &[PathBuf]) -> EtResult<Vec<PathBuf>> {
        let mut copied: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(sources.len());
        for source in sources {
            let file_name = match source.file_name() {
                Some(name) if source.is_file() => name,
                _ => {
                    return Err(ExperimentError::MissingSource {
                        path: source.clone(),
                    }
                    .into())
                }
            };
            let target = self.path.join(file_name);
            let canonical = fs::canonicalize(source)?;
            if let Some((taken, _)) = copied.iter().find(|(_, t)| *t == target) {
                if *taken == canonical {
                    debug!(source = %source.display(), "snapshot already taken");
                    continue;
                }
                return Err(ExperimentError::SnapshotCollision { path: target }.into());
            }
            fs::copy(source, &target)?;
            debug!(source = %source.display(), target = %target.display(), "snapshot source");
            copied.push((canonical, target));
        }
        Ok(copied.into_iter().map(|(_, target)| target).collect())
    }

    pub fn write_params(&self, params: &EsParams) -> EtResult<PathBuf> {
        let path = self.artifact(PARAMS_FILE);
        fs::write(&path, serde_json::to_string_pretty(params)?)?;
        Ok(path)
    }

    /// Record the settings the run actually used.
    pub fn write_config(&self, config: &ExperimentConfig) -> EtResult<PathBuf> {
        let path = self.artifact(CONFIG_FILE);
        fs::write(&path, serde_json::to_string_pretty(config)?)?;
        Ok(path)
    }

    pub fn write_final_model(&self, genes: &[f64]) -> EtResult<PathBuf> {
        let path = self.artifact(FINAL_MODEL_FILE);
        fs::write(&path, serde_json::to_string(genes)?)?;
        Ok(path)
    }

    pub fn write_time_to_train(&self, elapsed: Duration) -> EtResult<PathBuf> {
        let path = self.artifact(TIME_TO_TRAIN_FILE);
        fs::write(&path, format_elapsed(elapsed))?;
        Ok(path)
    }

    pub fn write_logbook(&self, logbook: &Logbook) -> EtResult<PathBuf> {
        let path = self.artifact(LOGBOOK_FILE);
        logbook.write_csv(&path)?;
        Ok(path)
    }

    pub fn write_summary(&self, summary: &RunSummary) -> EtResult<PathBuf> {
        let path = self.artifact(SUMMARY_FILE);
        fs::write(&path, serde_json::to_string_pretty(summary)?)?;
        Ok(path)
    }

    /// Read back a final model written by [`RunDirectory::write_final_model`].
    pub fn read_final_model(&self) -> EtResult<Vec<f64>> {
        let text = fs::read_to_string(self.artifact(FINAL_MODEL_FILE))?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use et_types::EtError;
    use tempfile::tempdir;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 7, 59)
            .unwrap()
    }

    #[test]
    fn directory_name_layout() {
        let name = run_directory_name(
            "GameFitness",
            "CartPole-v1",
            timestamp(),
            "centroid_5_sigma_5_ngen_400",
        );
        assert_eq!(
            name,
            "GameFitness_CartPole-v1_2024-03-05-14-07-centroid_5_sigma_5_ngen_400"
        );
    }

    #[test]
    fn elapsed_has_two_decimals() {
        assert_eq!(format_elapsed(Duration::from_millis(12_345)), "12.35  seconds");
        assert_eq!(format_elapsed(Duration::ZERO), "0.00  seconds");
    }

    #[test]
    fn create_makes_logs_dir_and_refuses_reuse() {
        let root = tempdir().unwrap();
        let logs = root.path().join("nested").join("logs");

        let run = RunDirectory::create(&logs, "run_a").unwrap();
        assert!(run.path().is_dir());
        assert_eq!(run.path(), logs.join("run_a"));

        let err = RunDirectory::create(&logs, "run_a").unwrap_err();
        assert!(matches!(
            err,
            EtError::Experiment(ExperimentError::RunDirectoryExists { .. })
        ));
    }

    #[test]
    fn snapshot_copies_sources() {
        let root = tempdir().unwrap();
        let source = root.path().join("GameFitness.toml");
        fs::write(&source, "game = \"CartPole-v1\"").unwrap();

        let run = RunDirectory::create(root.path().join("logs"), "run").unwrap();
        let copied = run
            .snapshot_sources(&[source.clone(), source.clone()])
            .unwrap();
        assert_eq!(copied, vec![run.artifact("GameFitness.toml")]);
        assert_eq!(
            fs::read_to_string(run.artifact("GameFitness.toml")).unwrap(),
            "game = \"CartPole-v1\""
        );
    }

    #[test]
    fn snapshot_missing_source_fails() {
        let root = tempdir().unwrap();
        let run = RunDirectory::create(root.path(), "run").unwrap();
        let err = run
            .snapshot_sources(&[root.path().join("absent.py")])
            .unwrap_err();
        assert!(matches!(
            err,
            EtError::Experiment(ExperimentError::MissingSource { .. })
        ));
    }

    #[test]
    fn same_name_from_different_dirs_collides() {
        let root = tempdir().unwrap();
        for (dir, content) in [("a", "AAA"), ("b", "BBB")] {
            fs::create_dir(root.path().join(dir)).unwrap();
            fs::write(root.path().join(dir).join("GameFitness.py"), content).unwrap();
        }

        let run = RunDirectory::create(root.path().join("logs"), "run").unwrap();
        let err = run
            .snapshot_sources(&[
                root.path().join("a/GameFitness.py"),
                root.path().join("b/GameFitness.py"),
            ])
            .unwrap_err();
        assert!(matches!(
            err,
            EtError::Experiment(ExperimentError::SnapshotCollision { .. })
        ));
    }

    #[test]
    fn same_file_through_different_paths_copied_once() {
        let root = tempdir().unwrap();
        fs::create_dir(root.path().join("src")).unwrap();
        let source = root.path().join("src").join("TrainEs.py");
        fs::write(&source, "pass").unwrap();

        let run = RunDirectory::create(root.path().join("logs"), "run").unwrap();
        let copied = run
            .snapshot_sources(&[source, root.path().join("src/../src/TrainEs.py")])
            .unwrap();
        assert_eq!(copied, vec![run.artifact("TrainEs.py")]);
    }

    #[test]
    fn nested_game_name_is_rejected() {
        let root = tempdir().unwrap();
        let name = run_directory_name("GameFitness", "ALE/Pong-v5", timestamp(), "d");
        let err = RunDirectory::create(root.path(), &name).unwrap_err();
        assert!(matches!(err, EtError::Validation(_)));
        assert!(check_path_component("game", "ALE/Pong-v5").is_err());
        assert!(check_path_component("game", "..").is_err());
        assert!(check_path_component("game", "Pong-v5").is_ok());
    }

    #[test]
    fn final_model_reads_back_exactly() {
        let root = tempdir().unwrap();
        let run = RunDirectory::create(root.path(), "run").unwrap();
        let genes = vec![2.6125601760975574e-5, -0.1 + 0.2, 1.0 / 3.0];
        run.write_final_model(&genes).unwrap();
        let read = run.read_final_model().unwrap();
        assert_eq!(
            read.iter().map(|g| g.to_bits()).collect::<Vec<_>>(),
            genes.iter().map(|g| g.to_bits()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn config_written_as_json() {
        let root = tempdir().unwrap();
        let run = RunDirectory::create(root.path(), "run").unwrap();
        let config = ExperimentConfig::default()
            .with_description("resolved")
            .with_params(EsParams::mountain_car_best());
        run.write_config(&config).unwrap();
        let read: ExperimentConfig =
            serde_json::from_str(&fs::read_to_string(run.artifact(CONFIG_FILE)).unwrap()).unwrap();
        assert_eq!(read, config);
    }

    #[test]
    fn artifacts_written() {
        let root = tempdir().unwrap();
        let run = RunDirectory::create(root.path(), "run").unwrap();

        run.write_params(&EsParams::mountain_car_best()).unwrap();
        let params: EsParams =
            serde_json::from_str(&fs::read_to_string(run.artifact(PARAMS_FILE)).unwrap()).unwrap();
        assert_eq!(params, EsParams::mountain_car_best());

        run.write_final_model(&[0.25, -1.5]).unwrap();
        assert_eq!(run.read_final_model().unwrap(), vec![0.25, -1.5]);

        run.write_time_to_train(Duration::from_secs(3)).unwrap();
        assert_eq!(
            fs::read_to_string(run.artifact(TIME_TO_TRAIN_FILE)).unwrap(),
            "3.00  seconds"
        );
    }
}
