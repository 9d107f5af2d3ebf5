//! # Neural Network Module
//!
//! Eager building blocks for the classifier that subset selection trains.
//!
//! Parameters are not owned by the layers. Every layer only knows the *names*
//! of its parameters (`"linear1.weights"`, `"linear1.bias"`) and reads the
//! actual values from a [`ParamMap`] passed into `forward`/`backward`. This
//! keeps a whole model state in one map that can be deep-cloned into a
//! [`ModelSnapshot`], stepped by an optimizer, and restored afterwards.
//!
//! ## Available Components
//!
//! - [`Linear`]: Fully connected layer `y = xW + b` with closed-form backward
//! - [`ReLU`], [`softmax_rows`]: Activations
//! - [`TwoLayerNet`]: `Linear -> ReLU -> Linear` classifier exposing its
//!   penultimate activations (needed by the gradient oracle)
//! - [`ModelSnapshot`]: Versioned, clonable parameter state
//!
//! ## Example
//!
//! ```ignore
//! use rustydss::nn::TwoLayerNet;
//! use rand::SeedableRng;
//!
//! let net = TwoLayerNet::new(784, 100, 10);
//! let mut rng = rand::rngs::StdRng::seed_from_u64(42);
//! let state = net.init_parameters(&mut rng);
//! let logits = net.forward(&state.params, &inputs)?;
//! ```

pub mod activations;
pub mod linear;
pub mod mlp;
pub mod module;
pub mod snapshot;

use thiserror::Error;

pub use activations::{softmax_rows, ReLU};
pub use linear::Linear;
pub use mlp::{ForwardPass, TwoLayerNet};
pub use module::Module;
pub use snapshot::{ModelSnapshot, ParamMap};

/// Errors raised when a parameter map does not fit the model that reads it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NnError {
    #[error("Параметр '{0}' отсутствует в состоянии модели")]
    MissingParameter(String),

    #[error("Параметр '{name}': ожидалась форма {expected:?}, получена {actual:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Параметр '{name}': ожидался ранг {expected}, получен {actual}")]
    Rank {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Несовместимые размеры входа: {0}")]
    InputShape(String),
}

pub type NnResult<T> = std::result::Result<T, NnError>;
