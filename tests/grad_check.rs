//! Интеграционный тест: аналитический обратный проход против конечных разностей.

use rustydss::losses::{cross_entropy_grad, cross_entropy_mean, weighted_cross_entropy};
use rustydss::nn::{Module, ParamMap, TwoLayerNet};

use ndarray::{array, Array2, ArrayD};
use rand::rngs::StdRng;
use rand::SeedableRng;

const EPSILON: f32 = 1e-3;
const TOLERANCE: f32 = 2e-2;
const ABS_FLOOR: f32 = 1e-3;

/// Сравнивает два тензора поэлементно и паникует, если они не близки.
fn assert_grads_are_close(name: &str, analytic: &ArrayD<f32>, numeric: &ArrayD<f32>) {
    assert_eq!(analytic.shape(), numeric.shape(), "{}: формы не совпадают", name);

    for (a, n) in analytic.iter().zip(numeric.iter()) {
        let diff = (a - n).abs();
        // Оба почти ноль: относительная ошибка ничего не значит.
        if diff < ABS_FLOOR {
            continue;
        }
        let relative_error = diff / a.abs().max(n.abs());
        if relative_error > TOLERANCE {
            panic!(
                "{}: градиенты не совпадают. Analytic: {:.6}, Numeric: {:.6}, Relative Error: {:.6}",
                name, a, n, relative_error
            );
        }
    }
}

/// Численный градиент скалярной функции по каждому параметру.
fn numeric_grads(params: &ParamMap, loss: impl Fn(&ParamMap) -> f32) -> ParamMap {
    let mut grads = ParamMap::new();
    for (name, value) in params {
        let mut grad = ArrayD::zeros(value.shape());
        for i in 0..value.len() {
            let mut plus = params.clone();
            if let Some(v) = plus.get_mut(name).and_then(|t| t.iter_mut().nth(i)) {
                *v += EPSILON;
            }
            let mut minus = params.clone();
            if let Some(v) = minus.get_mut(name).and_then(|t| t.iter_mut().nth(i)) {
                *v -= EPSILON;
            }
            if let Some(g) = grad.iter_mut().nth(i) {
                *g = (loss(&plus) - loss(&minus)) / (2.0 * EPSILON);
            }
        }
        grads.insert(name.clone(), grad);
    }
    grads
}

fn batch() -> (Array2<f32>, Vec<usize>) {
    let x = array![
        [0.5, -1.2, 0.3],
        [1.5, 0.2, -0.7],
        [-0.4, 0.9, 1.1],
        [0.0, -0.3, -1.6]
    ];
    (x, vec![0, 2, 1, 2])
}

#[test]
fn test_mean_cross_entropy_backward() {
    let net = TwoLayerNet::new(3, 5, 3);
    let state = net.init_parameters(&mut StdRng::seed_from_u64(42));
    let (x, y) = batch();

    let pass = net.forward_cached(&state.params, &x).unwrap();
    let grad_logits = cross_entropy_grad(&pass.logits, &y, None).unwrap();
    let analytic = net.backward(&state.params, &x, &pass, &grad_logits).unwrap();

    let numeric = numeric_grads(&state.params, |p| {
        let logits = net.forward(p, &x).unwrap();
        cross_entropy_mean(&logits, &y).unwrap()
    });

    for name in net.parameter_names() {
        assert_grads_are_close(&name, &analytic[&name], &numeric[&name]);
    }
}

#[test]
fn test_weighted_cross_entropy_backward() {
    let net = TwoLayerNet::new(3, 4, 3);
    let state = net.init_parameters(&mut StdRng::seed_from_u64(7));
    let (x, y) = batch();
    // gamma / N for a subset standing in for 10 points
    let weights = vec![0.4, 0.1, 0.3, 0.2];

    let pass = net.forward_cached(&state.params, &x).unwrap();
    let grad_logits = cross_entropy_grad(&pass.logits, &y, Some(&weights)).unwrap();
    let analytic = net.backward(&state.params, &x, &pass, &grad_logits).unwrap();

    let numeric = numeric_grads(&state.params, |p| {
        let logits = net.forward(p, &x).unwrap();
        weighted_cross_entropy(&logits, &y, &weights).unwrap()
    });

    for name in net.parameter_names() {
        assert_grads_are_close(&name, &analytic[&name], &numeric[&name]);
    }
}
