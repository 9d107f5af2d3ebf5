//! Модуль, реализующий полносвязный (линейный) слой.

use crate::nn::module::Module;
use crate::nn::snapshot::{matrix, vector};
use crate::nn::{NnError, NnResult, ParamMap};
use ndarray::{Array1, Array2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;

/// Полносвязный (линейный) слой.
///
/// Слой не хранит реальных данных. Он владеет только именами своих
/// параметров, `"<name>.weights"` формы `[in, out]` и `"<name>.bias"` формы
/// `[out]`, и берет значения из `ParamMap`, переданной в `forward`/`backward`.
///
/// Прямой проход вычисляет `y = xW + b`.
#[derive(Debug, Clone)]
pub struct Linear {
    /// Имя параметра весов.
    pub weights: String,
    /// Имя параметра смещений.
    pub bias: String,
    pub in_features: usize,
    pub out_features: usize,
}

/// Градиенты одного линейного слоя.
#[derive(Debug, Clone)]
pub struct LinearGrads {
    pub input: Array2<f32>,
    pub weights: Array2<f32>,
    pub bias: Array1<f32>,
}

impl Linear {
    /// Создает новый полносвязный слой.
    ///
    /// # Аргументы
    ///
    /// * `name` - Базовое имя слоя, чтобы параметры имели уникальные имена
    ///   (например, "linear1.weights", "linear1.bias").
    /// * `in_features` - Количество входных признаков.
    /// * `out_features` - Количество выходных признаков.
    pub fn new(name: &str, in_features: usize, out_features: usize) -> Self {
        Self {
            weights: format!("{}.weights", name),
            bias: format!("{}.bias", name),
            in_features,
            out_features,
        }
    }

    /// Записывает в `params` начальные значения параметров слоя.
    ///
    /// Веса и смещения берутся из `U(-1/sqrt(in), 1/sqrt(in))`.
    pub fn init<R: Rng>(&self, params: &mut ParamMap, rng: &mut R) {
        let bound = 1.0 / (self.in_features.max(1) as f32).sqrt();
        let dist = Uniform::new_inclusive(-bound, bound);
        let w = Array2::random_using((self.in_features, self.out_features), dist, rng);
        let b = Array1::random_using(self.out_features, dist, rng);
        params.insert(self.weights.clone(), w.into_dyn());
        params.insert(self.bias.clone(), b.into_dyn());
    }

    /// Проверяет, что формы параметров совпадают с объявленными размерами.
    pub fn check_shapes(&self, params: &ParamMap) -> NnResult<()> {
        let w = matrix(params, &self.weights)?;
        if w.dim() != (self.in_features, self.out_features) {
            return Err(NnError::ShapeMismatch {
                name: self.weights.clone(),
                expected: vec![self.in_features, self.out_features],
                actual: w.shape().to_vec(),
            });
        }
        let b = vector(params, &self.bias)?;
        if b.len() != self.out_features {
            return Err(NnError::ShapeMismatch {
                name: self.bias.clone(),
                expected: vec![self.out_features],
                actual: b.shape().to_vec(),
            });
        }
        Ok(())
    }

    /// Обратный проход для батча.
    ///
    /// `grad_output` имеет форму `[batch, out]`; возвращает градиенты по
    /// входу, весам (`xᵀ · grad_output`) и смещениям (сумма по батчу).
    pub fn backward(
        &self,
        params: &ParamMap,
        inputs: &Array2<f32>,
        grad_output: &Array2<f32>,
    ) -> NnResult<LinearGrads> {
        let w = matrix(params, &self.weights)?;
        if grad_output.ncols() != w.ncols() || grad_output.nrows() != inputs.nrows() {
            return Err(NnError::InputShape(format!(
                "{}: grad_output {:?} не согласован с входом {:?}",
                self.weights,
                grad_output.shape(),
                inputs.shape()
            )));
        }
        Ok(LinearGrads {
            input: grad_output.dot(&w.t()),
            weights: inputs.t().dot(grad_output),
            bias: grad_output.sum_axis(Axis(0)),
        })
    }
}

impl Module for Linear {
    fn forward(&self, params: &ParamMap, inputs: &Array2<f32>) -> NnResult<Array2<f32>> {
        let w = matrix(params, &self.weights)?;
        let b = vector(params, &self.bias)?;
        if inputs.ncols() != w.nrows() {
            return Err(NnError::InputShape(format!(
                "{}: вход {:?}, веса {:?}",
                self.weights,
                inputs.shape(),
                w.shape()
            )));
        }
        Ok(inputs.dot(&w) + &b)
    }

    fn parameter_names(&self) -> Vec<String> {
        vec![self.weights.clone(), self.bias.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fixed_layer() -> (Linear, ParamMap) {
        let layer = Linear::new("fc", 2, 3);
        let mut params = ParamMap::new();
        params.insert(
            "fc.weights".to_string(),
            array![[1.0, 0.0, -1.0], [2.0, 1.0, 0.0]].into_dyn(),
        );
        params.insert("fc.bias".to_string(), array![0.5, 0.0, 0.0].into_dyn());
        (layer, params)
    }

    #[test]
    fn test_forward() {
        let (layer, params) = fixed_layer();
        let x = array![[1.0, 1.0]];
        let y = layer.forward(&params, &x).unwrap();
        assert_eq!(y, array![[3.5, 1.0, -1.0]]);
    }

    #[test]
    fn test_backward_shapes_and_bias_sum() {
        let (layer, params) = fixed_layer();
        let x = array![[1.0, 1.0], [0.0, 2.0]];
        let g = array![[1.0, 0.0, 0.0], [1.0, 1.0, 0.0]];
        let grads = layer.backward(&params, &x, &g).unwrap();
        assert_eq!(grads.input.dim(), (2, 2));
        assert_eq!(grads.weights.dim(), (2, 3));
        assert_eq!(grads.bias, array![2.0, 1.0, 0.0]);
        assert_eq!(grads.input, array![[1.0, 2.0], [1.0, 3.0]]);
    }

    #[test]
    fn test_init_is_seeded_and_bounded() {
        let layer = Linear::new("fc", 4, 2);
        let mut a = ParamMap::new();
        let mut b = ParamMap::new();
        layer.init(&mut a, &mut StdRng::seed_from_u64(7));
        layer.init(&mut b, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert!(layer.check_shapes(&a).is_ok());
        assert!(a["fc.weights"].iter().all(|v| v.abs() <= 0.5));
    }

    #[test]
    fn test_forward_rejects_wrong_input_width() {
        let (layer, params) = fixed_layer();
        let x = array![[1.0, 1.0, 1.0]];
        assert!(matches!(layer.forward(&params, &x), Err(NnError::InputShape(_))));
    }
}
