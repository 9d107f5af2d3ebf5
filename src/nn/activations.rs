//! Модуль, содержащий функции активации, используемые классификатором.

use crate::nn::module::Module;
use crate::nn::{NnResult, ParamMap};
use ndarray::{Array2, Axis, Zip};

// --- Слой ReLU ---

/// Слой активации ReLU (Rectified Linear Unit).
///
/// Применяет поэлементную функцию `max(0, x)`.
/// Этот слой не имеет обучаемых параметров.
pub struct ReLU;

impl ReLU {
    /// Создает новый экземпляр слоя ReLU.
    pub fn new() -> Self {
        ReLU {}
    }

    /// Обратный проход: пропускает градиент только там, где вход был положительным.
    pub fn backward(&self, inputs: &Array2<f32>, grad_output: &Array2<f32>) -> Array2<f32> {
        let mut grad = grad_output.clone();
        Zip::from(&mut grad).and(inputs).for_each(|g, &x| {
            if x <= 0.0 {
                *g = 0.0;
            }
        });
        grad
    }
}

impl Default for ReLU {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for ReLU {
    fn forward(&self, _params: &ParamMap, inputs: &Array2<f32>) -> NnResult<Array2<f32>> {
        Ok(inputs.mapv(|x| x.max(0.0)))
    }

    /// ReLU не имеет обучаемых параметров, поэтому возвращаем пустой вектор.
    fn parameter_names(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Построчный softmax с вычитанием максимума для численной устойчивости.
pub fn softmax_rows(logits: &Array2<f32>) -> Array2<f32> {
    let mut probs = logits.clone();
    for mut row in probs.axis_iter_mut(Axis(0)) {
        let max_val = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        row.mapv_inplace(|v| (v - max_val).exp());
        let sum = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|v| v / sum);
        }
    }
    probs
}
