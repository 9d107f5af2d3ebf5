//! Gradient oracle for one-step (Taylor) greedy selection.
//!
//! For softmax cross-entropy the gradient of one example's loss with respect
//! to the last linear layer has a closed form. With `l = softmax(z) - onehot(y)`
//! and penultimate activations `h`, the flattened gradient is
//!
//! ```text
//! [ l[0] .. l[C-1] | l[0]*h[0] .. l[0]*h[H-1] | .. | l[C-1]*h[0] .. l[C-1]*h[H-1] ]
//! ```
//!
//! bias part first, then one block of `H` weight components per class.
//!
//! The gain of a candidate is `lr * <g_candidate, g_val>`, where `g_val` is
//! the mean validation gradient taken after a virtual SGD step along the sum
//! of the already selected gradients. Only the last layer moves in that step,
//! so the validation logits update in closed form: `z' = z - lr * (b_g + h W_g)`.

use crate::data::{Dataset, InMemoryDataset, PoolBatches};
use crate::nn::{softmax_rows, ModelSnapshot, TwoLayerNet};
use crate::selection::greedy::MarginalGain;
use crate::selection::{SelectionError, SelectionResult};
use log::debug;
use ndarray::{s, Array1, Array2, ArrayView1, Axis};

/// Per-example last-layer gradients, one row per example, `[B, C + C*H]`.
pub fn last_layer_gradients(
    hidden: &Array2<f32>,
    logits: &Array2<f32>,
    labels: &[usize],
) -> Array2<f32> {
    let (batch, h_dim) = hidden.dim();
    let c_dim = logits.ncols();
    let mut l0 = softmax_rows(logits);
    for (i, &y) in labels.iter().enumerate() {
        l0[[i, y]] -= 1.0;
    }
    let mut grads = Array2::zeros((batch, c_dim + c_dim * h_dim));
    for (i, mut row) in grads.axis_iter_mut(Axis(0)).enumerate() {
        row.slice_mut(s![..c_dim]).assign(&l0.row(i));
        for c in 0..c_dim {
            let start = c_dim + c * h_dim;
            let block = hidden.row(i).mapv(|h| h * l0[[i, c]]);
            row.slice_mut(s![start..start + h_dim]).assign(&block);
        }
    }
    grads
}

fn ensure_finite<'a>(values: impl IntoIterator<Item = &'a f32>, what: &str) -> SelectionResult<()> {
    if values.into_iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(SelectionError::Numeric(format!("{} содержит NaN/inf", what)))
    }
}

/// Taylor-gain oracle over a frozen snapshot.
///
/// Candidate ids are positions in the `pool` given to [`TaylorOracle::new`].
#[derive(Debug, Clone)]
pub struct TaylorOracle {
    lr: f32,
    num_classes: usize,
    hidden_dim: usize,
    /// Training-pool gradients `[pool, C + C*H]`.
    train_grads: Array2<f32>,
    val_hidden: Array2<f32>,
    val_logits: Array2<f32>,
    val_labels: Vec<usize>,
    selected_sum: Array1<f32>,
    val_grad: Array1<f32>,
}

impl TaylorOracle {
    /// Precomputes the pool gradients in batches of `batch_size` and the
    /// validation gradient at the snapshot itself.
    pub fn new(
        model: &TwoLayerNet,
        snapshot: &ModelSnapshot,
        train: &InMemoryDataset,
        pool: &[usize],
        val: &InMemoryDataset,
        lr: f32,
        batch_size: usize,
    ) -> SelectionResult<Self> {
        model.check_parameters(&snapshot.params)?;
        if val.is_empty() {
            return Err(SelectionError::Configuration(
                "пустая валидационная выборка".to_string(),
            ));
        }
        if let Some(&bad) = pool.iter().find(|&&i| i >= train.len()) {
            return Err(SelectionError::Configuration(format!(
                "индекс {} вне обучающей выборки из {}",
                bad,
                train.len()
            )));
        }

        let num_classes = model.num_classes();
        let hidden_dim = model.hidden_dim();
        let dim = num_classes + num_classes * hidden_dim;
        let mut train_grads = Array2::zeros((pool.len(), dim));

        let batches = PoolBatches::new(pool, batch_size);
        let num_batches = batches.num_batches();
        for (offset, ids) in batches {
            let x = train.get_features_batch(ids);
            let y = train.get_labels_batch(ids);
            let pass = model.forward_cached(&snapshot.params, &x)?;
            let g = last_layer_gradients(&pass.hidden, &pass.logits, &y);
            train_grads
                .slice_mut(s![offset..offset + ids.len(), ..])
                .assign(&g);
        }
        ensure_finite(train_grads.iter(), "градиент обучающей выборки")?;
        debug!(
            "Taylor: {} градиентов размерности {} за {} батчей",
            pool.len(),
            dim,
            num_batches
        );

        let val_pass = model.forward_cached(&snapshot.params, val.features())?;
        let mut oracle = Self {
            lr,
            num_classes,
            hidden_dim,
            train_grads,
            val_hidden: val_pass.hidden,
            val_logits: val_pass.logits,
            val_labels: val.labels().to_vec(),
            selected_sum: Array1::zeros(dim),
            val_grad: Array1::zeros(dim),
        };
        oracle.val_grad = oracle.validation_gradient(oracle.selected_sum.view())?;
        Ok(oracle)
    }

    pub fn pool_len(&self) -> usize {
        self.train_grads.nrows()
    }

    pub fn train_gradients(&self) -> &Array2<f32> {
        &self.train_grads
    }

    pub fn current_validation_gradient(&self) -> &Array1<f32> {
        &self.val_grad
    }

    /// Mean last-layer validation gradient after the virtual step
    /// `theta - lr * selected_sum`.
    pub fn validation_gradient(&self, selected_sum: ArrayView1<f32>) -> SelectionResult<Array1<f32>> {
        let c_dim = self.num_classes;
        let h_dim = self.hidden_dim;
        if selected_sum.len() != c_dim + c_dim * h_dim {
            return Err(SelectionError::Configuration(format!(
                "сумма градиентов длины {}, ожидалось {}",
                selected_sum.len(),
                c_dim + c_dim * h_dim
            )));
        }
        let bias_grad = selected_sum.slice(s![..c_dim]);
        // Class-major blocks -> W_g[h, c].
        let weight_grad = Array2::from_shape_fn((h_dim, c_dim), |(h, c)| {
            selected_sum[c_dim + c * h_dim + h]
        });
        let shift = self.val_hidden.dot(&weight_grad) + &bias_grad;
        let logits = &self.val_logits - &(shift * self.lr);

        let grads = last_layer_gradients(&self.val_hidden, &logits, &self.val_labels);
        let mean = grads
            .mean_axis(Axis(0))
            .ok_or_else(|| SelectionError::Configuration("пустая валидационная выборка".into()))?;
        ensure_finite(mean.iter(), "градиент валидации")?;
        Ok(mean)
    }

    /// Predicted validation-loss decrease from adding `candidate`.
    pub fn score(&self, candidate: usize, validation_gradient: &Array1<f32>) -> f64 {
        let g = self.train_grads.row(candidate);
        let dot: f64 = g
            .iter()
            .zip(validation_gradient.iter())
            .map(|(&a, &b)| a as f64 * b as f64)
            .sum();
        self.lr as f64 * dot
    }
}

impl MarginalGain for TaylorOracle {
    fn marginal_gain(&mut self, candidate: usize) -> f64 {
        self.score(candidate, &self.val_grad)
    }

    fn commit(&mut self, candidate: usize) -> SelectionResult<()> {
        if candidate >= self.pool_len() {
            return Err(SelectionError::Configuration(format!(
                "кандидат {} вне пула из {}",
                candidate,
                self.pool_len()
            )));
        }
        self.selected_sum += &self.train_grads.row(candidate);
        self.val_grad = self.validation_gradient(self.selected_sum.view())?;
        Ok(())
    }
}
