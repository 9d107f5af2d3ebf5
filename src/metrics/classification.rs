//! Accuracy и precision/recall по метке 1.

use super::Metric;
use ndarray::{Array2, Axis};

/// Предсказанный класс для каждой строки логитов.
///
/// При равных логитах побеждает меньший номер класса; NaN никогда не
/// побеждает.
pub fn argmax_rows(logits: &Array2<f32>) -> Vec<usize> {
    logits
        .axis_iter(Axis(0))
        .map(|row| {
            let mut best = (0, f32::NEG_INFINITY);
            for (class, &v) in row.iter().enumerate() {
                if v > best.1 {
                    best = (class, v);
                }
            }
            best.0
        })
        .collect()
}

fn ratio(num: usize, denom: usize) -> f64 {
    if denom == 0 {
        0.0
    } else {
        num as f64 / denom as f64
    }
}

/// Доля верно предсказанных классов.
#[derive(Debug, Clone, Default)]
pub struct Accuracy {
    hits: usize,
    seen: usize,
}

impl Accuracy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Metric for Accuracy {
    type Prediction = Array2<f32>;
    type Target = [usize];
    type Output = f64;

    fn update(&mut self, predictions: &Array2<f32>, targets: &[usize]) {
        let predicted = argmax_rows(predictions);
        self.hits += predicted.iter().zip(targets).filter(|(p, t)| p == t).count();
        self.seen += predicted.len().min(targets.len());
    }

    fn compute(&self) -> f64 {
        ratio(self.hits, self.seen)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn name(&self) -> &str {
        "accuracy"
    }
}

/// Счетчики "метка 1 против остальных".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelOneCounts {
    pub hit: usize,
    pub false_alarm: usize,
    pub missed: usize,
}

impl LabelOneCounts {
    const LABEL: usize = 1;

    /// Добавляет пары (предсказание, истина).
    pub fn add(&mut self, predicted: &[usize], targets: &[usize]) {
        for (&p, &t) in predicted.iter().zip(targets) {
            match (p == Self::LABEL, t == Self::LABEL) {
                (true, true) => self.hit += 1,
                (true, false) => self.false_alarm += 1,
                (false, true) => self.missed += 1,
                (false, false) => {}
            }
        }
    }

    /// TP / (TP + FP); 0, если метка 1 ни разу не предсказана.
    pub fn precision(&self) -> f64 {
        ratio(self.hit, self.hit + self.false_alarm)
    }

    /// TP / (TP + FN); 0, если метки 1 нет среди целей.
    pub fn recall(&self) -> f64 {
        ratio(self.hit, self.hit + self.missed)
    }
}

/// Precision по метке 1.
#[derive(Debug, Clone, Default)]
pub struct Precision(LabelOneCounts);

impl Precision {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Metric for Precision {
    type Prediction = Array2<f32>;
    type Target = [usize];
    type Output = f64;

    fn update(&mut self, predictions: &Array2<f32>, targets: &[usize]) {
        self.0.add(&argmax_rows(predictions), targets);
    }

    fn compute(&self) -> f64 {
        self.0.precision()
    }

    fn reset(&mut self) {
        self.0 = LabelOneCounts::default();
    }

    fn name(&self) -> &str {
        "precision"
    }
}

/// Recall по метке 1.
#[derive(Debug, Clone, Default)]
pub struct Recall(LabelOneCounts);

impl Recall {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Metric for Recall {
    type Prediction = Array2<f32>;
    type Target = [usize];
    type Output = f64;

    fn update(&mut self, predictions: &Array2<f32>, targets: &[usize]) {
        self.0.add(&argmax_rows(predictions), targets);
    }

    fn compute(&self) -> f64 {
        self.0.recall()
    }

    fn reset(&mut self) {
        self.0 = LabelOneCounts::default();
    }

    fn name(&self) -> &str {
        "recall"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn accuracy_over_several_batches() {
        let mut acc = Accuracy::new();
        acc.update(&array![[2.0, -1.0], [0.1, 0.3]], &[0, 1]);
        acc.update(&array![[0.5, 0.4], [-3.0, 3.0]], &[1, 1]);
        assert_abs_diff_eq!(acc.compute(), 0.75);
        acc.reset();
        assert_eq!(acc.compute(), 0.0);
    }

    #[test]
    fn argmax_prefers_lower_class_and_skips_nan() {
        let logits = array![[1.0, 1.0, 0.0], [0.0, 2.0, 2.0], [f32::NAN, -1.0, -2.0]];
        assert_eq!(argmax_rows(&logits), vec![0, 1, 1]);
    }

    #[test]
    fn precision_recall_of_label_one() {
        // predicted 1, 1, 0, 2, 1 against 1, 0, 1, 1, 1
        let logits = array![
            [0.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 1.0, 0.0],
        ];
        let targets = [1, 0, 1, 1, 1];

        let mut p = Precision::new();
        p.update(&logits, &targets);
        assert_abs_diff_eq!(p.compute(), 2.0 / 3.0, epsilon = 1e-12);

        let mut r = Recall::new();
        r.update(&logits, &targets);
        assert_abs_diff_eq!(r.compute(), 0.5);
    }

    #[test]
    fn label_one_never_predicted() {
        let mut counts = LabelOneCounts::default();
        counts.add(&[0, 0, 2], &[1, 0, 1]);
        assert_eq!(counts, LabelOneCounts { hit: 0, false_alarm: 0, missed: 2 });
        assert_eq!(counts.precision(), 0.0);
        assert_eq!(counts.recall(), 0.0);
    }
}
