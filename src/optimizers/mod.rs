//! Модуль, содержащий реализации оптимизаторов для обновления весов модели.
//!
//! Оптимизаторы получают текущие веса в виде `ParamMap` и градиенты с теми
//! же ключами и применяют алгоритм обновления на месте.

use crate::nn::{ModelSnapshot, ParamMap};

/// Трейт, определяющий общий интерфейс для всех оптимизаторов.
pub trait Optimizer {
    /// Выполняет один шаг оптимизации, обновляя веса.
    ///
    /// # Аргументы
    ///
    /// * `parameters` - Текущие значения весов модели.
    ///   Ключ - это имя параметра (например, "linear1.weights").
    /// * `gradients` - Вычисленные значения градиентов для этих весов.
    fn step(&self, parameters: &mut ParamMap, gradients: &ParamMap);

    /// Шаг по живому состоянию модели с увеличением версии.
    fn step_snapshot(&self, state: &mut ModelSnapshot, gradients: &ParamMap) {
        self.step(&mut state.params, gradients);
        state.bump_version();
    }
}

/// Реализация оптимизатора Stochastic Gradient Descent (SGD).
#[derive(Debug, Clone, Copy)]
pub struct Sgd {
    /// Скорость обучения (learning rate).
    lr: f32,
}

impl Sgd {
    /// Создает новый экземпляр оптимизатора SGD.
    pub fn new(lr: f32) -> Self {
        Self { lr }
    }
}

impl Optimizer for Sgd {
    fn step(&self, parameters: &mut ParamMap, gradients: &ParamMap) {
        for (param_name, grad_value) in gradients {
            if let Some(param_value) = parameters.get_mut(param_name) {
                if param_value.shape() != grad_value.shape() {
                    log::warn!(
                        "Пропуск '{}': форма градиента {:?} не совпадает с {:?}",
                        param_name,
                        grad_value.shape(),
                        param_value.shape()
                    );
                    continue;
                }
                // param = param - lr * grad
                ndarray::azip!((p in param_value, &g in grad_value) *p -= self.lr * g);
            }
        }
    }
}
