//! Синтетические датасеты: гауссовы кластеры, по одному на класс.
//!
//! Позволяют прогонять весь конвейер без файлов на диске.

use crate::data::loader::scale_splits;
use crate::data::{DataError, DataResult, DatasetSplits, InMemoryDataset};
use ndarray::{s, Array1, Array2};
use ndarray_rand::rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Параметры генератора.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Размер обучающей части; валидационная и тестовая получают по 10%.
    pub num_train: usize,
    pub num_features: usize,
    pub num_classes: usize,
    /// Стандартное отклонение точек вокруг центра кластера.
    pub cluster_std: f32,
    /// Относительные доли классов; `None` означает равные.
    pub class_proportions: Option<Vec<f32>>,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self::new(1000, 2, 2)
    }
}

impl SyntheticConfig {
    pub fn new(num_train: usize, num_features: usize, num_classes: usize) -> Self {
        Self {
            num_train,
            num_features,
            num_classes,
            cluster_std: 1.0,
            class_proportions: None,
            seed: 42,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_cluster_std(mut self, cluster_std: f32) -> Self {
        self.cluster_std = cluster_std;
        self
    }

    /// Задает несбалансированные классы, например `[5.0, 3.0, 2.0]`.
    pub fn with_class_proportions(mut self, proportions: Vec<f32>) -> Self {
        self.class_proportions = Some(proportions);
        self
    }

    /// Число точек каждого класса для выборки размера `n`.
    ///
    /// Остаток от округления вниз раздается классам по порядку.
    pub fn class_sizes(&self, n: usize) -> DataResult<Vec<usize>> {
        let weights = match &self.class_proportions {
            Some(p) if p.len() != self.num_classes => {
                return Err(DataError::InvalidConfig(format!(
                    "{} долей для {} классов",
                    p.len(),
                    self.num_classes
                )))
            }
            Some(p) if p.iter().any(|w| !w.is_finite() || *w < 0.0) || p.iter().sum::<f32>() <= 0.0 => {
                return Err(DataError::InvalidConfig("доли классов должны быть неотрицательны".into()))
            }
            Some(p) => p.clone(),
            None => vec![1.0; self.num_classes],
        };
        let total: f32 = weights.iter().sum();
        let mut sizes: Vec<usize> = weights
            .iter()
            .map(|w| (w * n as f32 / total).floor() as usize)
            .collect();
        let assigned: usize = sizes.iter().sum();
        for size in sizes.iter_mut().take(n.saturating_sub(assigned)) {
            *size += 1;
        }
        Ok(sizes)
    }

    /// Генерирует стандартизованные train/val/test части.
    pub fn generate(&self) -> DataResult<DatasetSplits> {
        if self.num_classes < 2 || self.num_features == 0 || self.num_train < self.num_classes {
            return Err(DataError::InvalidConfig(format!(
                "нужно >= 2 классов, >= 1 признака и >= {} точек",
                self.num_classes
            )));
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        let centers = Array2::random_using(
            (self.num_classes, self.num_features),
            Uniform::new(-3.0f32, 3.0),
            &mut rng,
        );
        let noise = Normal::new(0.0f32, self.cluster_std)
            .map_err(|e| DataError::InvalidConfig(e.to_string()))?;

        let held_out = (self.num_train / 10).max(self.num_classes);
        let mut draw = |n: usize| -> DataResult<InMemoryDataset> {
            let sizes = self.class_sizes(n)?;
            let mut labels: Vec<usize> = sizes
                .iter()
                .enumerate()
                .flat_map(|(c, &k)| std::iter::repeat(c).take(k))
                .collect();
            labels.shuffle(&mut rng);
            let mut features =
                Array2::random_using((labels.len(), self.num_features), noise, &mut rng);
            for (i, &y) in labels.iter().enumerate() {
                let center: Array1<f32> = centers.row(y).to_owned();
                let mut row = features.slice_mut(s![i, ..]);
                row += &center;
            }
            InMemoryDataset::new(features, labels, self.num_classes)
        };

        let train = draw(self.num_train)?;
        let val = draw(held_out)?;
        let test = draw(held_out)?;
        scale_splits(train, val, test, self.num_classes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;

    #[test]
    fn test_generate_sizes() {
        let splits = SyntheticConfig::new(1000, 8, 3).generate().unwrap();
        assert_eq!(splits.train.len(), 1000);
        assert_eq!(splits.val.len(), 100);
        assert_eq!(splits.test.len(), 100);
        assert_eq!(splits.num_features(), 8);
        assert_eq!(splits.train.class_counts().iter().sum::<usize>(), 1000);
    }

    #[test]
    fn test_class_proportions() {
        let cfg = SyntheticConfig::new(1000, 2, 3).with_class_proportions(vec![5.0, 3.0, 2.0]);
        assert_eq!(cfg.class_sizes(1000).unwrap(), vec![500, 300, 200]);
        assert_eq!(cfg.class_sizes(11).unwrap().iter().sum::<usize>(), 11);
        let splits = cfg.generate().unwrap();
        assert_eq!(splits.train.class_counts(), vec![500, 300, 200]);
    }

    #[test]
    fn test_same_seed_same_data() {
        let a = SyntheticConfig::new(50, 2, 2).with_seed(7).generate().unwrap();
        let b = SyntheticConfig::new(50, 2, 2).with_seed(7).generate().unwrap();
        assert_eq!(a.train.features(), b.train.features());
        assert_eq!(a.train.labels(), b.train.labels());
    }

    #[test]
    fn test_rejects_bad_proportions() {
        let cfg = SyntheticConfig::new(100, 2, 3).with_class_proportions(vec![1.0, 1.0]);
        assert!(matches!(cfg.generate(), Err(DataError::InvalidConfig(_))));
    }
}
