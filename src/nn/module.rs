//! Module defining the core `Module` trait for all neural network layers.

use crate::nn::{NnResult, ParamMap};
use ndarray::Array2;

/// Trait defining the common interface for all layers/modules.
///
/// A `Module` holds no numbers itself. It reads its parameters by name from
/// the [`ParamMap`] handed to `forward`, so the same module can evaluate the
/// live training state and any number of frozen snapshots.
pub trait Module {
    /// Performs a forward pass for a batch `[batch, in_features]`.
    fn forward(&self, params: &ParamMap, inputs: &Array2<f32>) -> NnResult<Array2<f32>>;

    /// Returns the names of all trainable parameters that belong to this module.
    fn parameter_names(&self) -> Vec<String>;
}
