//! Метрики итоговой оценки и история потерь по эпохам.
//!
//! Все метрики классификации принимают логиты `[batch, classes]` и номера
//! классов; предсказанием считается argmax строки. Precision и recall
//! считаются для метки 1, как в бинарных наборах данных (`linsep`,
//! `svmguide1`). Для многоклассовых наборов это "класс 1 против остальных".

pub mod classification;
pub mod running;

pub use classification::{argmax_rows, Accuracy, LabelOneCounts, Precision, Recall};
pub use running::{MetricLogger, RunningMean};

/// Накопительная метрика: несколько вызовов `update`, затем `compute`.
pub trait Metric {
    type Prediction: ?Sized;
    type Target: ?Sized;
    type Output;

    fn update(&mut self, predictions: &Self::Prediction, targets: &Self::Target);

    fn compute(&self) -> Self::Output;

    fn reset(&mut self);

    /// Имя для логов.
    fn name(&self) -> &str;
}
