// --- Файл: src/experiment.rs ---

//! Эксперимент: все стратегии на одном датасете, `num_runs` повторов.
//!
//! Артефакты пишутся только после того, как все запуски завершились успешно.
//! При `num_runs > 1` каждый повтор получает свою поддиректорию `run_<k>`.

use crate::data::{DataError, Dataset, DatasetLoader, DatasetSplits};
use crate::selection::Strategy;
use crate::serialization::{ArtifactError, ArtifactWriter};
use crate::trainer::{RunReport, TrainConfig, TrainError, Trainer};
use log::info;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExperimentError {
    #[error("Ошибка данных: {0}")]
    Data(#[from] DataError),

    #[error("Ошибка обучения: {0}")]
    Train(#[from] TrainError),

    #[error("Ошибка записи результатов: {0}")]
    Artifact(#[from] ArtifactError),
}

pub type ExperimentResult<T> = std::result::Result<T, ExperimentError>;

/// Что и где запускать.
#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    pub datadir: PathBuf,
    pub dataset: String,
    pub results_root: PathBuf,
    pub train: TrainConfig,
    /// Стратегии в порядке запуска.
    pub strategies: Vec<Strategy>,
}

impl ExperimentConfig {
    pub fn new(datadir: impl Into<PathBuf>, dataset: impl Into<String>, train: TrainConfig) -> Self {
        Self {
            datadir: datadir.into(),
            dataset: dataset.into(),
            results_root: PathBuf::from("results"),
            train,
            strategies: Strategy::all(),
        }
    }

    pub fn with_results_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.results_root = root.into();
        self
    }

    pub fn with_strategies(mut self, strategies: Vec<Strategy>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn writer(&self) -> ArtifactWriter {
        ArtifactWriter::new(
            &self.results_root,
            &self.dataset,
            &self.train.feature,
            self.train.fraction,
            self.train.select_every,
        )
    }
}

/// Отчеты всех повторов и директории, куда они записаны.
#[derive(Debug)]
pub struct ExperimentOutcome {
    pub runs: Vec<Vec<RunReport>>,
    pub output_dirs: Vec<PathBuf>,
}

/// Один повтор: все стратегии с общим случайным стартом.
pub fn run_once(config: &TrainConfig, splits: &DatasetSplits, strategies: &[Strategy]) -> ExperimentResult<Vec<RunReport>> {
    let trainer = Trainer::new(config.clone(), splits)?;
    let start = trainer.initial_random_subset();
    let mut reports = Vec::with_capacity(strategies.len());
    for &strategy in strategies {
        let timer = Instant::now();
        let report = trainer.run(strategy, &start)?;
        info!(
            "{} завершен за {:.2?}, val acc {:.2}",
            strategy.name(),
            timer.elapsed(),
            report.evaluation.val_acc
        );
        reports.push(report);
    }
    Ok(reports)
}

/// Загружает данные, прогоняет все повторы и пишет артефакты.
pub fn run_experiment(config: &ExperimentConfig, loader: &dyn DatasetLoader) -> ExperimentResult<ExperimentOutcome> {
    config.train.validate()?;
    let splits = loader.load(&config.dataset, &config.datadir)?;
    info!(
        "{}: train {}, val {}, test {}, признаков {}, классов {}",
        config.dataset,
        splits.train.len(),
        splits.val.len(),
        splits.test.len(),
        splits.num_features(),
        splits.num_classes
    );
    run_on_splits(config, &splits)
}

/// То же, что [`run_experiment`], но на уже загруженных данных.
pub fn run_on_splits(config: &ExperimentConfig, splits: &DatasetSplits) -> ExperimentResult<ExperimentOutcome> {
    let num_runs = config.train.num_runs;
    let mut runs = Vec::with_capacity(num_runs);
    for run in 0..num_runs {
        let run_config = config.train.clone().with_seed(config.train.seed + run as u64);
        info!("Повтор {} из {} (seed {})", run + 1, num_runs, run_config.seed);
        runs.push(run_once(&run_config, splits, &config.strategies)?);
    }

    let base = config.writer();
    let mut output_dirs = Vec::with_capacity(num_runs);
    for (run, reports) in runs.iter().enumerate() {
        let writer = if num_runs > 1 {
            base.nested(&format!("run_{}", run + 1))
        } else {
            base.clone()
        };
        writer.write_all(reports, &config.train)?;
        output_dirs.push(writer.dir().to_path_buf());
    }
    Ok(ExperimentOutcome { runs, output_dirs })
}

/// Путь, куда попадут результаты повтора `run` (с нуля).
pub fn output_dir(config: &ExperimentConfig, run: usize) -> PathBuf {
    let base = config.writer();
    if config.train.num_runs > 1 {
        base.nested(&format!("run_{}", run + 1)).dir().to_path_buf()
    } else {
        base.dir().to_path_buf()
    }
}
