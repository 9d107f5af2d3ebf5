//! Class-stratified facility location (CRAIG).
//!
//! The budget is split across classes in proportion to class size, then each
//! class runs lazy greedy facility location over the logit gradients
//! `softmax(z) - onehot(y)` of its points. Every selected point gets a gamma
//! weight: the number of class points it is the closest representative of.

use crate::data::{Dataset, InMemoryDataset};
use crate::nn::{softmax_rows, ModelSnapshot, TwoLayerNet};
use crate::selection::facility_location::FacilityLocation;
use crate::selection::greedy::lazy_greedy;
use crate::selection::{validate_budget, Selection, SelectionError, SelectionResult};
use log::debug;

/// Per-class sub-budgets `floor(budget * n_c / N)`; the remainder goes one
/// each to the largest classes (smaller class id first on ties), so the
/// result always sums to `budget`.
pub fn class_budgets(counts: &[usize], budget: usize) -> SelectionResult<Vec<usize>> {
    let total: usize = counts.iter().sum();
    validate_budget(budget, total)?;

    let mut budgets: Vec<usize> = counts
        .iter()
        .map(|&n_c| ((budget as u128 * n_c as u128) / total as u128) as usize)
        .collect();
    let remainder = budget - budgets.iter().sum::<usize>();

    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by(|&a, &b| counts[b].cmp(&counts[a]).then(a.cmp(&b)));
    for &c in order.iter().take(remainder) {
        budgets[c] += 1;
    }
    Ok(budgets)
}

/// Runs class-wise selection on the snapshot and returns indices with gammas.
pub fn select_class_wise(
    model: &TwoLayerNet,
    snapshot: &ModelSnapshot,
    train: &InMemoryDataset,
    budget: usize,
) -> SelectionResult<Selection> {
    model.check_parameters(&snapshot.params)?;
    let budgets = class_budgets(&train.class_counts(), budget)?;

    let logits = model.forward_cached(&snapshot.params, train.features())?.logits;
    let mut grads = softmax_rows(&logits);
    for (i, &y) in train.labels().iter().enumerate() {
        grads[[i, y]] -= 1.0;
    }
    if grads.iter().any(|v| !v.is_finite()) {
        return Err(SelectionError::Numeric(
            "градиенты по логитам содержат NaN/inf".to_string(),
        ));
    }

    let mut indices = Vec::with_capacity(budget);
    let mut gammas = Vec::with_capacity(budget);
    for (class, members) in train.class_partition().into_iter().enumerate() {
        let class_budget = budgets[class];
        if class_budget == 0 {
            continue;
        }
        let rows = grads.select(ndarray::Axis(0), &members);
        let mut objective = FacilityLocation::from_features(&rows)?;
        let local: Vec<usize> = (0..members.len()).collect();
        let picked = lazy_greedy(&mut objective, &local, class_budget)?;
        gammas.extend(objective.gammas(&picked));
        indices.extend(picked.iter().map(|&k| members[k]));
        debug!(
            "CRAIG: класс {}: {} из {} точек, {} вызовов оракула",
            class,
            class_budget,
            members.len(),
            objective.oracle_calls()
        );
    }

    if indices.len() != budget {
        return Err(SelectionError::Configuration(format!(
            "отобрано {} точек вместо {}",
            indices.len(),
            budget
        )));
    }
    debug!("CRAIG: {} точек из {}", indices.len(), train.len());
    Ok(Selection::with_gammas(indices, gammas))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SyntheticConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_proportional_budgets() {
        assert_eq!(class_budgets(&[500, 300, 200], 100).unwrap(), vec![50, 30, 20]);
    }

    #[test]
    fn test_remainder_goes_to_largest_classes() {
        // floors: 3, 3, 3 -> remainder 1 to the largest (class 1)
        assert_eq!(class_budgets(&[10, 12, 11], 10).unwrap(), vec![3, 4, 3]);
        // ties on size: smaller id wins
        assert_eq!(class_budgets(&[5, 5, 5], 4).unwrap(), vec![2, 1, 1]);
    }

    #[test]
    fn test_budget_errors() {
        assert!(matches!(class_budgets(&[3, 3], 0), Err(SelectionError::Configuration(_))));
        assert!(matches!(class_budgets(&[3, 3], 7), Err(SelectionError::Configuration(_))));
    }

    #[test]
    fn test_class_wise_selection_respects_sub_budgets() {
        let splits = SyntheticConfig::new(120, 3, 3)
            .with_class_proportions(vec![3.0, 2.0, 1.0])
            .generate()
            .unwrap();
        let net = TwoLayerNet::new(3, 8, 3);
        let state = net.init_parameters(&mut StdRng::seed_from_u64(42));
        let sel = select_class_wise(&net, &state, &splits.train, 12).unwrap();

        assert_eq!(sel.len(), 12);
        let gammas = sel.gammas.clone().unwrap();
        assert_eq!(gammas.len(), 12);
        assert_eq!(gammas.iter().sum::<f32>(), 120.0);

        let labels = splits.train.get_labels_batch(&sel.indices);
        let mut per_class = [0usize; 3];
        for y in labels {
            per_class[y] += 1;
        }
        assert_eq!(per_class, [6, 4, 2]);
    }
}
