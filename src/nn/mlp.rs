//! Двухслойный перцептрон `Linear -> ReLU -> Linear`.
//!
//! Это классификатор, который обучается на выбранном подмножестве. Кроме
//! логитов он отдает активации предпоследнего слоя, которые нужны оракулу
//! градиентов для вычисления градиента по последнему слою в замкнутой форме.

use crate::nn::activations::ReLU;
use crate::nn::linear::Linear;
use crate::nn::module::Module;
use crate::nn::{ModelSnapshot, NnResult, ParamMap};
use ndarray::Array2;
use rand::Rng;

/// Промежуточные значения прямого прохода, сохраненные для обратного.
#[derive(Debug, Clone)]
pub struct ForwardPass {
    /// Выход первого линейного слоя (до ReLU).
    pub hidden_pre: Array2<f32>,
    /// Активации предпоследнего слоя (после ReLU), `[batch, hidden]`.
    pub hidden: Array2<f32>,
    /// Логиты, `[batch, classes]`.
    pub logits: Array2<f32>,
}

/// Классификатор с одним скрытым слоем.
#[derive(Debug, Clone)]
pub struct TwoLayerNet {
    linear1: Linear,
    linear2: Linear,
}

impl TwoLayerNet {
    pub fn new(in_features: usize, hidden: usize, num_classes: usize) -> Self {
        Self {
            linear1: Linear::new("linear1", in_features, hidden),
            linear2: Linear::new("linear2", hidden, num_classes),
        }
    }

    /// Создает начальное состояние модели (версия 0).
    pub fn init_parameters<R: Rng>(&self, rng: &mut R) -> ModelSnapshot {
        let mut params = ParamMap::new();
        self.linear1.init(&mut params, rng);
        self.linear2.init(&mut params, rng);
        ModelSnapshot::new(params)
    }

    /// Проверяет, что состояние подходит этой архитектуре.
    pub fn check_parameters(&self, params: &ParamMap) -> NnResult<()> {
        self.linear1.check_shapes(params)?;
        self.linear2.check_shapes(params)
    }

    /// Прямой проход с сохранением промежуточных значений.
    pub fn forward_cached(&self, params: &ParamMap, inputs: &Array2<f32>) -> NnResult<ForwardPass> {
        let hidden_pre = self.linear1.forward(params, inputs)?;
        let hidden = ReLU::new().forward(params, &hidden_pre)?;
        let logits = self.linear2.forward(params, &hidden)?;
        Ok(ForwardPass {
            hidden_pre,
            hidden,
            logits,
        })
    }

    /// Обратный проход по всей сети.
    ///
    /// `grad_logits`: градиент скалярной функции потерь по логитам. Возвращает
    /// карту градиентов с теми же ключами, что и у параметров.
    pub fn backward(
        &self,
        params: &ParamMap,
        inputs: &Array2<f32>,
        pass: &ForwardPass,
        grad_logits: &Array2<f32>,
    ) -> NnResult<ParamMap> {
        let g2 = self.linear2.backward(params, &pass.hidden, grad_logits)?;
        let grad_hidden = ReLU::new().backward(&pass.hidden_pre, &g2.input);
        let g1 = self.linear1.backward(params, inputs, &grad_hidden)?;

        let mut grads = ParamMap::new();
        grads.insert(self.linear1.weights.clone(), g1.weights.into_dyn());
        grads.insert(self.linear1.bias.clone(), g1.bias.into_dyn());
        grads.insert(self.linear2.weights.clone(), g2.weights.into_dyn());
        grads.insert(self.linear2.bias.clone(), g2.bias.into_dyn());
        Ok(grads)
    }

    /// Первый линейный слой; по его градиенту считается норма в контрольных точках.
    pub fn first_layer(&self) -> &Linear {
        &self.linear1
    }

    pub fn hidden_dim(&self) -> usize {
        self.linear1.out_features
    }

    pub fn num_classes(&self) -> usize {
        self.linear2.out_features
    }
}

impl Module for TwoLayerNet {
    fn forward(&self, params: &ParamMap, inputs: &Array2<f32>) -> NnResult<Array2<f32>> {
        Ok(self.forward_cached(params, inputs)?.logits)
    }

    fn parameter_names(&self) -> Vec<String> {
        let mut names = self.linear1.parameter_names();
        names.extend(self.linear2.parameter_names());
        names
    }
}
