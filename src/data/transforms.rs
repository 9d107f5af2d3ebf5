// --- Файл: src/data/transforms.rs ---

//! Преобразования признаков для предобработки.

use crate::data::{DataError, DataResult};
use ndarray::{Array1, Array2, Axis};

/// Трейт для преобразований данных.
pub trait Transform: Send + Sync {
    /// Применяет преобразование к матрице признаков `[N, D]`.
    fn apply(&self, data: &Array2<f32>) -> DataResult<Array2<f32>>;
}

/// Стандартизация по столбцам: `(x - mean) / std`.
///
/// Параметры оцениваются на обучающей выборке (`fit`) и затем применяются
/// к валидационной и тестовой. Столбцы с нулевой дисперсией не масштабируются.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: Array1<f32>,
    std: Array1<f32>,
}

impl StandardScaler {
    /// Вычисляет среднее и стандартное отклонение каждого столбца.
    pub fn fit(data: &Array2<f32>) -> DataResult<Self> {
        let mean = data
            .mean_axis(Axis(0))
            .ok_or_else(|| DataError::ShapeMismatch("нельзя обучить scaler на пустых данных".into()))?;
        let std = data
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 1e-12 { s } else { 1.0 });
        Ok(Self { mean, std })
    }

    /// `fit` и сразу `apply` к тем же данным.
    pub fn fit_transform(data: &Array2<f32>) -> DataResult<(Self, Array2<f32>)> {
        let scaler = Self::fit(data)?;
        let scaled = scaler.apply(data)?;
        Ok((scaler, scaled))
    }

    pub fn mean(&self) -> &Array1<f32> {
        &self.mean
    }

    pub fn std(&self) -> &Array1<f32> {
        &self.std
    }
}

impl Transform for StandardScaler {
    fn apply(&self, data: &Array2<f32>) -> DataResult<Array2<f32>> {
        if data.ncols() != self.mean.len() {
            return Err(DataError::ShapeMismatch(format!(
                "scaler обучен на {} признаках, получено {}",
                self.mean.len(),
                data.ncols()
            )));
        }
        Ok((data - &self.mean) / &self.std)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_standard_scaler() {
        let data = array![[1.0, 5.0], [3.0, 5.0], [5.0, 5.0]];
        let (scaler, scaled) = StandardScaler::fit_transform(&data).unwrap();

        assert_abs_diff_eq!(scaler.mean()[0], 3.0);
        let col0 = scaled.column(0);
        assert_abs_diff_eq!(col0.sum(), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(col0.std(0.0), 1.0, epsilon = 1e-6);
        // Постоянный столбец только центрируется.
        assert!(scaled.column(1).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_apply_checks_width() {
        let scaler = StandardScaler::fit(&array![[1.0, 2.0]]).unwrap();
        assert!(scaler.apply(&array![[1.0, 2.0, 3.0]]).is_err());
    }
}
