//! # Subset Selection Module
//!
//! Greedy maximization of set functions over a pool of training indices.
//!
//! ## Components
//!
//! - [`greedy`]: the [`MarginalGain`] seam plus naive and lazy greedy drivers
//! - [`facility_location`]: coverage objective over pairwise similarities
//! - [`taylor`]: gradient oracle scoring candidates by the first-order Taylor
//!   decrease of the validation loss
//! - [`craig`]: class-stratified facility location with gamma weights
//! - [`strategy`]: the [`Strategy`] catalogue used by the training loop and
//!   the [`SelectionContext`] threaded through successive rounds
//!
//! Every selector works on a deep copy of the model state and never mutates
//! the live parameters.

pub mod craig;
pub mod facility_location;
pub mod greedy;
pub mod strategy;
pub mod taylor;

use crate::data::DataError;
use crate::nn::NnError;
use thiserror::Error;

pub use craig::{class_budgets, select_class_wise};
pub use facility_location::FacilityLocation;
pub use greedy::{lazy_greedy, naive_greedy, MarginalGain};
pub use strategy::{SelectionContext, SelectionInputs, Strategy};
pub use taylor::{last_layer_gradients, TaylorOracle};

/// Errors raised by one selection call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectionError {
    /// Budget/pool mismatch, unsupported variant or inconsistent inputs.
    #[error("Ошибка конфигурации отбора: {0}")]
    Configuration(String),

    /// A gradient, loss or gain that should be finite is not.
    #[error("Нечисловое значение при отборе: {0}")]
    Numeric(String),

    /// No candidate with a finite gain was left before the budget was met.
    #[error("Нет допустимых кандидатов: выбрано {selected} из {budget}")]
    OracleFailure { selected: usize, budget: usize },
}

impl SelectionError {
    /// `true` for errors that abort only the current round.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SelectionError::Numeric(_) | SelectionError::OracleFailure { .. }
        )
    }
}

impl From<NnError> for SelectionError {
    fn from(err: NnError) -> Self {
        SelectionError::Configuration(err.to_string())
    }
}

impl From<DataError> for SelectionError {
    fn from(err: DataError) -> Self {
        SelectionError::Configuration(err.to_string())
    }
}

pub type SelectionResult<T> = std::result::Result<T, SelectionError>;

/// Result of one selection call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Selection {
    /// Selected training indices in the order they were picked.
    pub indices: Vec<usize>,
    /// Per-index weights; only CRAIG produces them.
    pub gammas: Option<Vec<f32>>,
}

impl Selection {
    pub fn new(indices: Vec<usize>) -> Self {
        Self {
            indices,
            gammas: None,
        }
    }

    pub fn with_gammas(indices: Vec<usize>, gammas: Vec<f32>) -> Self {
        Self {
            indices,
            gammas: Some(gammas),
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Checks `0 < budget <= pool`.
pub fn validate_budget(budget: usize, pool: usize) -> SelectionResult<()> {
    if budget == 0 {
        return Err(SelectionError::Configuration(
            "бюджет должен быть положительным".to_string(),
        ));
    }
    if budget > pool {
        return Err(SelectionError::Configuration(format!(
            "бюджет {} больше пула {}",
            budget, pool
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_budget() {
        assert!(validate_budget(1, 1).is_ok());
        assert!(matches!(validate_budget(0, 5), Err(SelectionError::Configuration(_))));
        assert!(matches!(validate_budget(6, 5), Err(SelectionError::Configuration(_))));
    }

    #[test]
    fn test_recoverable_kinds() {
        assert!(SelectionError::Numeric("nan".into()).is_recoverable());
        assert!(SelectionError::OracleFailure { selected: 0, budget: 1 }.is_recoverable());
        assert!(!SelectionError::Configuration("x".into()).is_recoverable());
    }
}
