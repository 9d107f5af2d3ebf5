//! Средние за эпоху и история по эпохам.

use std::collections::BTreeMap;

/// Инкрементальное среднее (обновление Уэлфорда).
#[derive(Debug, Clone, Default)]
pub struct RunningMean {
    mean: f64,
    count: usize,
}

impl RunningMean {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, value: f64) {
        self.count += 1;
        self.mean += (value - self.mean) / self.count as f64;
    }

    pub fn compute(&self) -> f64 {
        self.mean
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// Кривые потерь одного запуска: имя серии -> значение на каждой эпохе.
///
/// Значения, залогированные внутри эпохи, усредняются; `end_epoch` добавляет
/// по одной точке в каждую серию. Серии упорядочены по имени.
#[derive(Debug, Clone, Default)]
pub struct MetricLogger {
    history: BTreeMap<String, Vec<f64>>,
    pending: BTreeMap<String, RunningMean>,
    epochs: usize,
}

impl MetricLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&mut self, series: &str, value: f64) {
        self.pending.entry(series.to_string()).or_default().update(value);
    }

    pub fn end_epoch(&mut self) {
        for (series, mean) in std::mem::take(&mut self.pending) {
            self.history.entry(series).or_default().push(mean.compute());
        }
        self.epochs += 1;
    }

    pub fn epochs(&self) -> usize {
        self.epochs
    }

    pub fn series(&self, name: &str) -> Option<&[f64]> {
        self.history.get(name).map(Vec::as_slice)
    }

    pub fn last(&self, name: &str) -> Option<f64> {
        self.series(name).and_then(|s| s.last().copied())
    }

    pub fn into_history(self) -> BTreeMap<String, Vec<f64>> {
        self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn running_mean_matches_plain_mean() {
        let values = [0.25, 4.0, -1.5, 3.0, 2.0];
        let mut rm = RunningMean::new();
        values.iter().for_each(|&v| rm.update(v));
        assert_eq!(rm.count(), 5);
        assert_abs_diff_eq!(rm.compute(), values.iter().sum::<f64>() / 5.0, epsilon = 1e-12);
    }

    #[test]
    fn logger_keeps_one_point_per_epoch() {
        let mut logger = MetricLogger::new();
        logger.log("val", 1.0);
        logger.log("val", 0.5);
        logger.log("substrn", 0.9);
        logger.end_epoch();
        logger.log("val", 0.4);
        logger.end_epoch();

        assert_eq!(logger.epochs(), 2);
        assert_eq!(logger.series("val"), Some(&[0.75, 0.4][..]));
        assert_eq!(logger.series("substrn"), Some(&[0.9][..]));
        assert_eq!(logger.last("val"), Some(0.4));
        assert!(logger.series("fulltrn").is_none());

        let history = logger.into_history();
        assert_eq!(history.keys().collect::<Vec<_>>(), vec!["substrn", "val"]);
    }
}
