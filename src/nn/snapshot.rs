//! Снимок состояния модели: именованные параметры и номер версии.
//!
//! Живая модель во время обучения тоже является `ModelSnapshot`; оптимизатор
//! обновляет его на месте и увеличивает версию. Селектор получает глубокую
//! копию (`clone`) и никогда не видит живое состояние.

use crate::nn::{NnError, NnResult};
use ndarray::{ArrayD, ArrayView1, ArrayView2, Ix1, Ix2};
use std::collections::HashMap;

/// Отображение "имя параметра" -> значение.
/// Ключи имеют вид `"<layer>.weights"` / `"<layer>.bias"`.
pub type ParamMap = HashMap<String, ArrayD<f32>>;

/// Версионированный набор параметров модели.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSnapshot {
    /// Номер версии; увеличивается после каждого шага оптимизатора.
    pub version: u64,
    /// Значения параметров.
    pub params: ParamMap,
}

impl ModelSnapshot {
    /// Создает снимок версии 0.
    pub fn new(params: ParamMap) -> Self {
        Self { version: 0, params }
    }

    /// Отмечает, что параметры были изменены.
    pub fn bump_version(&mut self) {
        self.version += 1;
    }

    /// Возвращает параметр как матрицу.
    pub fn matrix(&self, name: &str) -> NnResult<ArrayView2<'_, f32>> {
        matrix(&self.params, name)
    }

    /// Возвращает параметр как вектор.
    pub fn vector(&self, name: &str) -> NnResult<ArrayView1<'_, f32>> {
        vector(&self.params, name)
    }

    /// Проверяет, что все значения конечны.
    pub fn is_finite(&self) -> bool {
        self.params.values().all(|p| p.iter().all(|v| v.is_finite()))
    }
}

pub(crate) fn matrix<'a>(params: &'a ParamMap, name: &str) -> NnResult<ArrayView2<'a, f32>> {
    let value = params
        .get(name)
        .ok_or_else(|| NnError::MissingParameter(name.to_string()))?;
    value
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|_| NnError::Rank {
            name: name.to_string(),
            expected: 2,
            actual: value.ndim(),
        })
}

pub(crate) fn vector<'a>(params: &'a ParamMap, name: &str) -> NnResult<ArrayView1<'a, f32>> {
    let value = params
        .get(name)
        .ok_or_else(|| NnError::MissingParameter(name.to_string()))?;
    value
        .view()
        .into_dimensionality::<Ix1>()
        .map_err(|_| NnError::Rank {
            name: name.to_string(),
            expected: 1,
            actual: value.ndim(),
        })
}

/// L2-норма значений под ключами `names` (например, градиентов одного слоя).
///
/// Ключи, которых нет в карте, не учитываются.
pub fn l2_norm_of<S: AsRef<str>>(params: &ParamMap, names: &[S]) -> f32 {
    names
        .iter()
        .filter_map(|name| params.get(name.as_ref()))
        .flat_map(|p| p.iter())
        .map(|v| v * v)
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn sample() -> ModelSnapshot {
        let mut params = ParamMap::new();
        params.insert("fc.weights".to_string(), ArrayD::from_elem(IxDyn(&[2, 3]), 1.0));
        params.insert("fc.bias".to_string(), ArrayD::zeros(IxDyn(&[3])));
        ModelSnapshot::new(params)
    }

    #[test]
    fn test_clone_is_independent() {
        let live = sample();
        let mut copy = live.clone();
        copy.params.get_mut("fc.bias").unwrap().fill(5.0);
        copy.bump_version();

        assert_eq!(live.version, 0);
        assert_eq!(live.vector("fc.bias").unwrap().sum(), 0.0);
    }

    #[test]
    fn test_wrong_rank_is_reported() {
        let snap = sample();
        assert!(matches!(snap.matrix("fc.bias"), Err(NnError::Rank { expected: 2, .. })));
        assert!(matches!(snap.vector("nope"), Err(NnError::MissingParameter(_))));
    }

    #[test]
    fn test_l2_norm_over_named_entries() {
        let mut snap = sample();
        snap.params
            .insert("head.bias".to_string(), ArrayD::from_elem(IxDyn(&[2]), 3.0));
        assert!((l2_norm_of(&snap.params, &["fc.weights", "fc.bias"]) - 6.0f32.sqrt()).abs() < 1e-6);
        assert!((l2_norm_of(&snap.params, &["head.bias", "missing"]) - 18.0f32.sqrt()).abs() < 1e-6);
    }
}
