// --- Файл: src/data/dataset.rs ---

//! Определение трейта Dataset и датасета в памяти.

use crate::data::{DataError, DataResult};
use ndarray::{concatenate, Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;

/// Трейт для источников данных.
///
/// Каждый датасет должен уметь:
/// - Возвращать количество элементов
/// - Возвращать элемент по индексу
pub trait Dataset: Send + Sync {
    /// Тип элемента данных (features)
    type Item;
    /// Тип метки (label)
    type Label;

    /// Возвращает количество элементов в датасете.
    fn len(&self) -> usize;

    /// Проверяет, пуст ли датасет.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Возвращает элемент и метку по индексу.
    fn get(&self, index: usize) -> Option<(Self::Item, Self::Label)>;

    /// Возвращает только метку по индексу.
    fn get_label(&self, index: usize) -> Option<Self::Label> {
        self.get(index).map(|(_, label)| label)
    }
}

/// Датасет, хранящий данные в памяти.
///
/// Признаки: плотная матрица `[num_samples, num_features]`, метки: номера
/// классов с нуля. Данные неизменяемы и разделяются через `Arc`, поэтому
/// клонирование дешевое.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    features: Arc<Array2<f32>>,
    labels: Arc<Vec<usize>>,
    num_classes: usize,
}

impl InMemoryDataset {
    /// Создает новый датасет из признаков и меток.
    ///
    /// Возвращает ошибку, если число строк не совпадает с числом меток или
    /// если какая-либо метка `>= num_classes`.
    pub fn new(features: Array2<f32>, labels: Vec<usize>, num_classes: usize) -> DataResult<Self> {
        if features.nrows() != labels.len() {
            return Err(DataError::ShapeMismatch(format!(
                "{} строк признаков и {} меток",
                features.nrows(),
                labels.len()
            )));
        }
        if let Some(&bad) = labels.iter().find(|&&y| y >= num_classes) {
            return Err(DataError::InvalidLabel {
                label: bad as i64,
                num_classes,
            });
        }
        Ok(Self {
            features: Arc::new(features),
            labels: Arc::new(labels),
            num_classes,
        })
    }

    pub fn num_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn features(&self) -> &Array2<f32> {
        &self.features
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Возвращает строки признаков по индексам (в порядке индексов).
    pub fn get_features_batch(&self, indices: &[usize]) -> Array2<f32> {
        self.features.select(Axis(0), indices)
    }

    /// Возвращает метки по индексам.
    pub fn get_labels_batch(&self, indices: &[usize]) -> Vec<usize> {
        indices.iter().map(|&i| self.labels[i]).collect()
    }

    /// Новый датасет из выбранных строк.
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            features: Arc::new(self.get_features_batch(indices)),
            labels: Arc::new(self.get_labels_batch(indices)),
            num_classes: self.num_classes,
        }
    }

    /// Индексы каждого класса: `result[c]` - возрастающий список индексов
    /// точек с меткой `c`.
    pub fn class_partition(&self) -> Vec<Vec<usize>> {
        let mut parts = vec![Vec::new(); self.num_classes];
        for (i, &y) in self.labels.iter().enumerate() {
            parts[y].push(i);
        }
        parts
    }

    /// Число точек каждого класса.
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.num_classes];
        for &y in self.labels.iter() {
            counts[y] += 1;
        }
        counts
    }

    /// Объединяет два датасета (строки `other` идут после строк `self`).
    pub fn concat(&self, other: &InMemoryDataset) -> DataResult<Self> {
        if self.num_features() != other.num_features() || self.num_classes != other.num_classes {
            return Err(DataError::ShapeMismatch(format!(
                "нельзя объединить {}x{} ({} классов) и {}x{} ({} классов)",
                self.len(),
                self.num_features(),
                self.num_classes,
                other.len(),
                other.num_features(),
                other.num_classes
            )));
        }
        let features = concatenate(Axis(0), &[self.features.view(), other.features.view()])
            .map_err(|e| DataError::ShapeMismatch(e.to_string()))?;
        let mut labels = self.labels.as_ref().clone();
        labels.extend_from_slice(&other.labels);
        Ok(Self {
            features: Arc::new(features),
            labels: Arc::new(labels),
            num_classes: self.num_classes,
        })
    }

    /// Копия с преобразованными признаками.
    pub fn map_features<F>(&self, f: F) -> Self
    where
        F: FnOnce(&Array2<f32>) -> Array2<f32>,
    {
        Self {
            features: Arc::new(f(&self.features)),
            labels: Arc::clone(&self.labels),
            num_classes: self.num_classes,
        }
    }
}

impl Dataset for InMemoryDataset {
    type Item = Array1<f32>;
    type Label = usize;

    fn len(&self) -> usize {
        self.labels.len()
    }

    fn get(&self, index: usize) -> Option<(Self::Item, Self::Label)> {
        if index >= self.len() {
            return None;
        }
        let feature = self.features.index_axis(Axis(0), index).to_owned();
        Some((feature, self.labels[index]))
    }
}

/// Делит датасет на две части после перемешивания с фиксированным seed.
///
/// Вторая часть содержит `floor(test_fraction * N)` точек.
pub fn train_test_split(
    dataset: &InMemoryDataset,
    test_fraction: f32,
    seed: u64,
) -> DataResult<(InMemoryDataset, InMemoryDataset)> {
    if !(0.0..1.0).contains(&test_fraction) {
        return Err(DataError::InvalidConfig(format!(
            "доля теста {} вне [0, 1)",
            test_fraction
        )));
    }
    let mut indices: Vec<usize> = (0..dataset.len()).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let n_test = (test_fraction * dataset.len() as f32).floor() as usize;
    let (test_idx, train_idx) = indices.split_at(n_test);
    Ok((dataset.subset(train_idx), dataset.subset(test_idx)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn create_test_dataset() -> InMemoryDataset {
        let features = array![[0.0, 1.0], [1.0, 1.0], [2.0, 0.0], [3.0, 3.0], [4.0, 2.0]];
        InMemoryDataset::new(features, vec![0, 1, 0, 2, 0], 3).unwrap()
    }

    #[test]
    fn test_new_rejects_bad_labels() {
        let features = Array2::zeros((2, 2));
        assert!(matches!(
            InMemoryDataset::new(features.clone(), vec![0, 3], 3),
            Err(DataError::InvalidLabel { label: 3, .. })
        ));
        assert!(matches!(
            InMemoryDataset::new(features, vec![0], 3),
            Err(DataError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_class_partition_and_counts() {
        let ds = create_test_dataset();
        assert_eq!(ds.class_partition(), vec![vec![0, 2, 4], vec![1], vec![3]]);
        assert_eq!(ds.class_counts(), vec![3, 1, 1]);
    }

    #[test]
    fn test_batches_follow_index_order() {
        let ds = create_test_dataset();
        let x = ds.get_features_batch(&[3, 0]);
        assert_eq!(x, array![[3.0, 3.0], [0.0, 1.0]]);
        assert_eq!(ds.get_labels_batch(&[3, 0]), vec![2, 0]);
    }

    #[test]
    fn test_concat() {
        let ds = create_test_dataset();
        let both = ds.concat(&ds.subset(&[1])).unwrap();
        assert_eq!(both.len(), 6);
        assert_eq!(both.get(5).unwrap().1, 1);
    }

    #[test]
    fn test_split_sizes_are_disjoint() {
        let ds = create_test_dataset();
        let (a, b) = train_test_split(&ds, 0.4, 42).unwrap();
        assert_eq!(a.len(), 3);
        assert_eq!(b.len(), 2);
        let mut firsts: Vec<f32> = a
            .features()
            .column(0)
            .iter()
            .chain(b.features().column(0).iter())
            .copied()
            .collect();
        firsts.sort_by(|x, y| x.total_cmp(y));
        assert_eq!(firsts, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }
}
