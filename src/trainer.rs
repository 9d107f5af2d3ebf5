//! # Training Loop Driver
//!
//! Trains a [`TwoLayerNet`] with full-batch SGD on the active subset and
//! re-selects the subset every `select_every` epochs.
//!
//! At each checkpoint the driver hands the selector a deep copy of the live
//! parameters. A `NumericError` or `OracleFailure` aborts only that round: the
//! previous subset stays active and a warning is logged. Configuration errors
//! abort the whole run.

use crate::data::{sample_without_replacement, DataError, Dataset, DatasetSplits, InMemoryDataset};
use crate::losses::{cross_entropy_grad, cross_entropy_mean};
use crate::metrics::{Accuracy, Metric, MetricLogger, Precision, Recall};
use crate::nn::snapshot::l2_norm_of;
use crate::nn::{ModelSnapshot, Module, NnError, ParamMap, TwoLayerNet};
use crate::optimizers::{Optimizer, Sgd};
use crate::selection::{
    validate_budget, Selection, SelectionContext, SelectionError, SelectionInputs, Strategy,
};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors that abort a training run.
#[derive(Error, Debug)]
pub enum TrainError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Model(#[from] NnError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("Некорректная конфигурация: {0}")]
    Config(String),

    #[error("Ошибка JSON конфигурации: {0}")]
    Json(#[from] serde_json::Error),
}

pub type TrainResult<T> = std::result::Result<T, TrainError>;

/// How Taylor-driven strategies obtain their first subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarmStart {
    /// Start from the shared random subset.
    Online,
    /// Run one selection on the freshly initialised model before epoch 0.
    OneStep,
}

impl WarmStart {
    /// `0` -> online, `1` -> one-step.
    pub fn from_flag(flag: u8) -> TrainResult<Self> {
        match flag {
            0 => Ok(WarmStart::Online),
            1 => Ok(WarmStart::OneStep),
            other => Err(TrainError::Config(format!(
                "режим разогрева должен быть 0 или 1, получено {}",
                other
            ))),
        }
    }
}

/// Run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Share of the training set selected, `budget = floor(fraction * N)`.
    pub fraction: f64,
    pub num_epochs: usize,
    /// Epochs between re-selections.
    pub select_every: usize,
    pub learning_rate: f32,
    pub hidden_units: usize,
    /// Seed for model initialisation and for the selection generator.
    pub seed: u64,
    /// Batch size for precomputing per-example gradients.
    pub greedy_batch_size: usize,
    pub warm_start: WarmStart,
    /// Log losses every `print_every` epochs.
    pub print_every: usize,
    /// Free-form feature tag; only used to name the output directory.
    pub feature: String,
    pub num_runs: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            fraction: 0.1,
            num_epochs: 200,
            select_every: 20,
            learning_rate: 0.05,
            hidden_units: 100,
            seed: 42,
            greedy_batch_size: 1200,
            warm_start: WarmStart::Online,
            print_every: 50,
            feature: "dss".to_string(),
            num_runs: 1,
        }
    }
}

impl TrainConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fraction(mut self, fraction: f64) -> Self {
        self.fraction = fraction;
        self
    }

    pub fn with_num_epochs(mut self, num_epochs: usize) -> Self {
        self.num_epochs = num_epochs;
        self
    }

    pub fn with_select_every(mut self, select_every: usize) -> Self {
        self.select_every = select_every;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_hidden_units(mut self, hidden_units: usize) -> Self {
        self.hidden_units = hidden_units;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_greedy_batch_size(mut self, greedy_batch_size: usize) -> Self {
        self.greedy_batch_size = greedy_batch_size;
        self
    }

    pub fn with_warm_start(mut self, warm_start: WarmStart) -> Self {
        self.warm_start = warm_start;
        self
    }

    pub fn with_print_every(mut self, print_every: usize) -> Self {
        self.print_every = print_every;
        self
    }

    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.feature = feature.into();
        self
    }

    pub fn with_num_runs(mut self, num_runs: usize) -> Self {
        self.num_runs = num_runs;
        self
    }

    /// Checks value ranges.
    pub fn validate(&self) -> TrainResult<()> {
        if !(self.fraction > 0.0 && self.fraction <= 1.0) {
            return Err(TrainError::Config(format!(
                "доля {} вне (0, 1]",
                self.fraction
            )));
        }
        if self.num_epochs == 0 || self.select_every == 0 {
            return Err(TrainError::Config(
                "число эпох и интервал отбора должны быть положительными".to_string(),
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(TrainError::Config(format!(
                "скорость обучения {} должна быть положительной",
                self.learning_rate
            )));
        }
        if self.hidden_units == 0 || self.greedy_batch_size == 0 || self.num_runs == 0 {
            return Err(TrainError::Config(
                "hidden_units, greedy_batch_size и num_runs должны быть положительными".to_string(),
            ));
        }
        if self.feature.is_empty() || self.feature.contains(['/', '\\']) {
            return Err(TrainError::Config(format!(
                "некорректный тег признаков '{}'",
                self.feature
            )));
        }
        Ok(())
    }

    /// `floor(fraction * n)`.
    pub fn budget(&self, n: usize) -> usize {
        (self.fraction * n as f64 + 1e-9).floor() as usize
    }

    /// Number of re-selection checkpoints in one run.
    pub fn num_checkpoints(&self) -> usize {
        self.num_epochs / self.select_every
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json(text: &str) -> TrainResult<Self> {
        let config: TrainConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> TrainResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Final losses and accuracies of one run. Accuracies are percentages.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evaluation {
    pub fulltrn_loss: f32,
    pub subtrn_loss: f32,
    pub val_loss: f32,
    pub val_acc: f64,
    pub test_loss: f32,
    pub test_acc: f64,
    /// Precision/recall of label 1.
    pub val_precision: f64,
    pub val_recall: f64,
    pub test_precision: f64,
    pub test_recall: f64,
}

/// Everything recorded during one run of one strategy.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub strategy: Strategy,
    pub substrn_losses: Vec<f32>,
    pub fulltrn_losses: Vec<f32>,
    pub val_losses: Vec<f32>,
    /// Initial subset followed by the active subset after every checkpoint.
    pub subset_history: Vec<Vec<usize>>,
    /// First-layer L2 norm of the subset-loss gradient at every checkpoint
    /// of a reselecting strategy; empty for the others.
    pub grad_norms: Vec<f32>,
    /// Checkpoints whose selection failed and kept the previous subset.
    pub skipped_rounds: usize,
    pub final_subset: Vec<usize>,
    pub evaluation: Evaluation,
}

/// Runs strategies on one set of splits.
pub struct Trainer<'a> {
    config: TrainConfig,
    splits: &'a DatasetSplits,
    model: TwoLayerNet,
    budget: usize,
}

impl<'a> Trainer<'a> {
    pub fn new(config: TrainConfig, splits: &'a DatasetSplits) -> TrainResult<Self> {
        config.validate()?;
        let n = splits.train.len();
        let budget = config.budget(n);
        validate_budget(budget, n)?;
        if splits.val.is_empty() {
            return Err(TrainError::Config("пустая валидационная выборка".to_string()));
        }
        let model = TwoLayerNet::new(splits.num_features(), config.hidden_units, splits.num_classes);
        Ok(Self {
            config,
            splits,
            model,
            budget,
        })
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn model(&self) -> &TwoLayerNet {
        &self.model
    }

    /// The random subset shared by all strategies that start at random.
    pub fn initial_random_subset(&self) -> Vec<usize> {
        let all: Vec<usize> = (0..self.splits.train.len()).collect();
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        sample_without_replacement(&mut rng, &all, self.budget)
    }

    fn check_start(&self, start: &[usize]) -> TrainResult<()> {
        let n = self.splits.train.len();
        let unique: BTreeSet<usize> = start.iter().copied().collect();
        if start.len() != self.budget || unique.len() != start.len() || start.iter().any(|&i| i >= n) {
            return Err(TrainError::Config(format!(
                "начальное подмножество должно содержать {} различных индексов из [0, {})",
                self.budget, n
            )));
        }
        Ok(())
    }

    fn inputs<'s>(&'s self, val: &'s InMemoryDataset, epoch: usize, current: &'s [usize]) -> SelectionInputs<'s> {
        SelectionInputs {
            model: &self.model,
            train: &self.splits.train,
            val,
            lr: self.config.learning_rate,
            batch_size: self.config.greedy_batch_size,
            epoch,
            current,
        }
    }

    /// Trains with `strategy`, starting from `start` where the strategy
    /// begins at random.
    pub fn run(&self, strategy: Strategy, start: &[usize]) -> TrainResult<RunReport> {
        self.check_start(start)?;
        let cfg = &self.config;
        let train = &self.splits.train;
        let n = train.len();
        info!("{}: бюджет {} из {}", strategy.name(), self.budget, n);

        let mut live = self.model.init_parameters(&mut StdRng::seed_from_u64(cfg.seed));
        let mut ctx = SelectionContext::new(cfg.seed);

        let regularized_val = if strategy == Strategy::FaclocRegularized {
            let facloc = Strategy::FacilityLocation.select(
                self.budget,
                &live,
                &self.inputs(&self.splits.val, 0, start),
                &mut ctx,
            )?;
            Some(self.splits.val.concat(&train.subset(&facloc.indices))?)
        } else {
            None
        };
        let selection_val = regularized_val.as_ref().unwrap_or(&self.splits.val);

        let initial = match strategy {
            Strategy::FullTraining => Selection::new((0..n).collect()),
            Strategy::Random | Strategy::OnlineRandom => Selection::new(start.to_vec()),
            Strategy::FacilityLocation | Strategy::Craig { .. } => {
                let snapshot = live.clone();
                strategy.select(self.budget, &snapshot, &self.inputs(selection_val, 0, start), &mut ctx)?
            }
            Strategy::Stepwise => Selection::new(ctx.init_stepwise(
                n,
                self.budget,
                cfg.select_every,
                cfg.num_epochs,
            )?),
            _ => match cfg.warm_start {
                WarmStart::Online => Selection::new(start.to_vec()),
                WarmStart::OneStep => {
                    let snapshot = live.clone();
                    match strategy.select(self.budget, &snapshot, &self.inputs(selection_val, 0, start), &mut ctx) {
                        Ok(sel) => sel,
                        Err(e) if e.is_recoverable() => {
                            warn!("{}: разогрев не удался ({}), старт со случайного подмножества", strategy.name(), e);
                            Selection::new(start.to_vec())
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            },
        };
        let mut subset = initial.indices;
        let mut gammas = initial.gammas;

        let sgd = Sgd::new(cfg.learning_rate);
        let mut logger = MetricLogger::new();
        let mut subset_history = Vec::with_capacity(cfg.num_checkpoints() + 1);
        subset_history.push(subset.clone());
        let mut grad_norms = Vec::with_capacity(cfg.num_checkpoints());
        let mut skipped_rounds = 0;

        for epoch in 0..cfg.num_epochs {
            let x = train.get_features_batch(&subset);
            let y = train.get_labels_batch(&subset);
            let pass = self.model.forward_cached(&live.params, &x)?;
            let weights: Option<Vec<f32>> = gammas
                .as_ref()
                .map(|g| g.iter().map(|&gamma| gamma / n as f32).collect());
            let grad_logits = cross_entropy_grad(&pass.logits, &y, weights.as_deref())?;
            let grads = self.model.backward(&live.params, &x, &pass, &grad_logits)?;
            let grad_norm = self.first_layer_grad_norm(&grads);
            let subset_loss = cross_entropy_mean(&pass.logits, &y)?;
            sgd.step_snapshot(&mut live, &grads);

            let full_loss = self.loss_on(&live, train)?;
            let val_loss = self.loss_on(&live, &self.splits.val)?;
            logger.log("substrn", subset_loss as f64);
            logger.log("fulltrn", full_loss as f64);
            logger.log("val", val_loss as f64);
            logger.end_epoch();

            if epoch % cfg.print_every.max(1) == 0 {
                info!(
                    "{} эпоха {}: SubsetTrn {:.4}, FullTrn {:.4}, Val {:.4}",
                    strategy.name(),
                    epoch + 1,
                    subset_loss,
                    full_loss,
                    val_loss
                );
            }

            if (epoch + 1) % cfg.select_every != 0 {
                continue;
            }

            if strategy.reselects() {
                grad_norms.push(grad_norm);
                // The selector only ever sees this copy.
                let snapshot = live.clone();
                let inputs = self.inputs(selection_val, epoch, &subset);
                let outcome = if snapshot.is_finite() {
                    strategy.select(self.budget, &snapshot, &inputs, &mut ctx)
                } else {
                    Err(SelectionError::Numeric(
                        "параметры модели содержат NaN/inf".to_string(),
                    ))
                };
                match outcome {
                    Ok(sel) => {
                        subset = sel.indices;
                        gammas = sel.gammas;
                    }
                    Err(e) if e.is_recoverable() => {
                        skipped_rounds += 1;
                        warn!(
                            "{} эпоха {}: отбор прерван ({}), остается прежнее подмножество",
                            strategy.name(),
                            epoch + 1,
                            e
                        );
                    }
                    Err(e) => return Err(e.into()),
                }
                debug_assert_eq!(snapshot.version, live.version);
                debug!("{}: классы подмножества {:?}", strategy.name(), self.class_histogram(&subset));
            }
            subset_history.push(subset.clone());
        }

        let evaluation = self.evaluate(&live, &subset)?;
        info!(
            "{}: val acc {:.2}, test acc {:.2}, val loss {:.4}, test loss {:.4}",
            strategy.name(),
            evaluation.val_acc,
            evaluation.test_acc,
            evaluation.val_loss,
            evaluation.test_loss
        );

        let history = logger.into_history();
        let series = |key: &str| -> Vec<f32> {
            history
                .get(key)
                .map(|h| h.iter().map(|&v| v as f32).collect())
                .unwrap_or_default()
        };
        Ok(RunReport {
            strategy,
            substrn_losses: series("substrn"),
            fulltrn_losses: series("fulltrn"),
            val_losses: series("val"),
            subset_history,
            grad_norms,
            skipped_rounds,
            final_subset: subset,
            evaluation,
        })
    }

    fn loss_on(&self, state: &ModelSnapshot, data: &InMemoryDataset) -> TrainResult<f32> {
        let logits = self.model.forward(&state.params, data.features())?;
        Ok(cross_entropy_mean(&logits, data.labels())?)
    }

    /// L2 norm of the gradient over the first layer (weights and bias).
    fn first_layer_grad_norm(&self, grads: &ParamMap) -> f32 {
        let names = self.model.first_layer().parameter_names();
        l2_norm_of(grads, names.as_slice())
    }

    fn class_histogram(&self, subset: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.splits.num_classes];
        for y in self.splits.train.get_labels_batch(subset) {
            counts[y] += 1;
        }
        counts
    }

    /// Final losses, accuracies and label-1 precision/recall.
    pub fn evaluate(&self, state: &ModelSnapshot, subset: &[usize]) -> TrainResult<Evaluation> {
        let train = &self.splits.train;
        let sub_x = train.get_features_batch(subset);
        let sub_y = train.get_labels_batch(subset);
        let sub_logits = self.model.forward(&state.params, &sub_x)?;

        let score = |data: &InMemoryDataset| -> TrainResult<(f32, f64, f64, f64)> {
            let logits = self.model.forward(&state.params, data.features())?;
            let loss = cross_entropy_mean(&logits, data.labels())?;
            let mut acc = Accuracy::new();
            let mut precision = Precision::new();
            let mut recall = Recall::new();
            acc.update(&logits, data.labels());
            precision.update(&logits, data.labels());
            recall.update(&logits, data.labels());
            Ok((loss, 100.0 * acc.compute(), precision.compute(), recall.compute()))
        };
        let (val_loss, val_acc, val_precision, val_recall) = score(&self.splits.val)?;
        let (test_loss, test_acc, test_precision, test_recall) = score(&self.splits.test)?;

        Ok(Evaluation {
            fulltrn_loss: self.loss_on(state, train)?,
            subtrn_loss: cross_entropy_mean(&sub_logits, &sub_y)?,
            val_loss,
            val_acc,
            test_loss,
            test_acc,
            val_precision,
            val_recall,
            test_precision,
            test_recall,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SyntheticConfig;
    use approx::assert_abs_diff_eq;

    fn small_splits() -> DatasetSplits {
        SyntheticConfig::new(200, 4, 3).generate().unwrap()
    }

    fn small_config() -> TrainConfig {
        TrainConfig::new()
            .with_fraction(0.1)
            .with_num_epochs(20)
            .with_select_every(5)
            .with_hidden_units(8)
            .with_greedy_batch_size(64)
    }

    #[test]
    fn test_config_validation() {
        assert!(TrainConfig::new().validate().is_ok());
        assert!(TrainConfig::new().with_fraction(0.0).validate().is_err());
        assert!(TrainConfig::new().with_fraction(1.5).validate().is_err());
        assert!(TrainConfig::new().with_select_every(0).validate().is_err());
        assert!(TrainConfig::new().with_learning_rate(f32::NAN).validate().is_err());
        assert!(TrainConfig::new().with_feature("a/b").validate().is_err());
    }

    #[test]
    fn test_budget_is_floor() {
        let cfg = TrainConfig::new().with_fraction(0.7);
        assert_eq!(cfg.budget(1000), 700);
        assert_eq!(cfg.with_fraction(0.1).budget(999), 99);
    }

    #[test]
    fn test_config_json_round_trip_and_defaults() {
        let cfg = small_config().with_warm_start(WarmStart::OneStep);
        let back = TrainConfig::from_json(&cfg.to_json().unwrap()).unwrap();
        assert_eq!(cfg, back);

        let partial = TrainConfig::from_json(r#"{"fraction": 0.2}"#).unwrap();
        assert_eq!(partial.fraction, 0.2);
        assert_eq!(partial.num_epochs, 200);
        assert!(TrainConfig::from_json(r#"{"fraction": 2.0}"#).is_err());
    }

    #[test]
    fn test_warm_start_flag() {
        assert_eq!(WarmStart::from_flag(0).unwrap(), WarmStart::Online);
        assert_eq!(WarmStart::from_flag(1).unwrap(), WarmStart::OneStep);
        assert!(WarmStart::from_flag(2).is_err());
    }

    #[test]
    fn test_zero_budget_is_configuration_error() {
        let splits = small_splits();
        let cfg = small_config().with_fraction(0.001);
        assert!(matches!(
            Trainer::new(cfg, &splits),
            Err(TrainError::Selection(SelectionError::Configuration(_)))
        ));
    }

    #[test]
    fn test_random_run_keeps_subset() {
        let splits = small_splits();
        let trainer = Trainer::new(small_config(), &splits).unwrap();
        let start = trainer.initial_random_subset();
        let report = trainer.run(Strategy::Random, &start).unwrap();

        assert_eq!(report.substrn_losses.len(), 20);
        assert_eq!(report.subset_history.len(), 5);
        assert!(report.subset_history.iter().all(|s| *s == start));
        assert!(report.grad_norms.is_empty());
        assert!(report.evaluation.val_acc >= 0.0 && report.evaluation.val_acc <= 100.0);
    }

    #[test]
    fn test_craig_run_and_one_step_warm_start() {
        let splits = small_splits();
        let trainer = Trainer::new(small_config().with_warm_start(WarmStart::OneStep), &splits).unwrap();
        let start = trainer.initial_random_subset();

        let craig = trainer.run(Strategy::Craig { convex: false }, &start).unwrap();
        assert!(craig.subset_history.iter().all(|s| s.len() == 20));
        assert!(craig.fulltrn_losses.iter().all(|l| l.is_finite()));

        let taylor = trainer.run(Strategy::TaylorOnline, &start).unwrap();
        assert_eq!(taylor.subset_history[0].len(), 20);
        assert_ne!(taylor.subset_history[0], start);
    }

    #[test]
    fn test_bad_start_subset_rejected() {
        let splits = small_splits();
        let trainer = Trainer::new(small_config(), &splits).unwrap();
        assert!(matches!(
            trainer.run(Strategy::Random, &[0, 0]),
            Err(TrainError::Config(_))
        ));
    }

    #[test]
    fn test_grad_norm_covers_first_layer_only() {
        let splits = small_splits();
        let cfg = small_config().with_num_epochs(1).with_select_every(1);
        let trainer = Trainer::new(cfg.clone(), &splits).unwrap();
        let start = trainer.initial_random_subset();
        let report = trainer.run(Strategy::TaylorOnline, &start).unwrap();
        assert_eq!(report.grad_norms.len(), 1);

        // Same gradient as the first epoch of the run.
        let model = trainer.model();
        let state = model.init_parameters(&mut StdRng::seed_from_u64(cfg.seed));
        let x = splits.train.get_features_batch(&start);
        let y = splits.train.get_labels_batch(&start);
        let pass = model.forward_cached(&state.params, &x).unwrap();
        let grad_logits = cross_entropy_grad(&pass.logits, &y, None).unwrap();
        let grads = model.backward(&state.params, &x, &pass, &grad_logits).unwrap();

        let squares = |keys: &[&str]| -> f32 {
            keys.iter()
                .flat_map(|k| grads[*k].iter())
                .map(|v| v * v)
                .sum::<f32>()
        };
        let first = squares(&["linear1.weights", "linear1.bias"]).sqrt();
        let everything = (squares(&["linear1.weights", "linear1.bias"])
            + squares(&["linear2.weights", "linear2.bias"]))
        .sqrt();
        assert_abs_diff_eq!(report.grad_norms[0], first, epsilon = 1e-5);
        assert!(everything > first);
    }

    #[test]
    fn test_facloc_regularized_keeps_budget() {
        let splits = small_splits();
        let trainer = Trainer::new(small_config(), &splits).unwrap();
        let start = trainer.initial_random_subset();
        let report = trainer.run(Strategy::FaclocRegularized, &start).unwrap();

        assert_eq!(report.subset_history.len(), 5);
        for subset in &report.subset_history {
            assert_eq!(subset.len(), trainer.budget());
            assert_eq!(subset.iter().collect::<BTreeSet<_>>().len(), subset.len());
        }
        assert_eq!(report.skipped_rounds, 0);
        assert_eq!(report.grad_norms.len(), 4);
    }

    #[test]
    fn test_convex_craig_selects_once() {
        let splits = small_splits();
        let trainer = Trainer::new(small_config(), &splits).unwrap();
        let start = trainer.initial_random_subset();
        let report = trainer.run(Strategy::Craig { convex: true }, &start).unwrap();

        assert_eq!(report.subset_history.len(), 5);
        assert_eq!(report.subset_history[0].len(), 20);
        assert!(report.subset_history.iter().all(|s| *s == report.subset_history[0]));
        assert_eq!(report.final_subset, report.subset_history[0]);
        assert!(report.grad_norms.is_empty());
    }
}
