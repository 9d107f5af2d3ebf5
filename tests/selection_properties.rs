//! Property tests for the greedy drivers and the selection strategies.

use ndarray::Array2;
use proptest::prelude::{prop, prop_assert, prop_assert_eq, proptest, ProptestConfig};
use proptest::strategy::Strategy as PropStrategy;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rustydss::data::{Dataset, SyntheticConfig};
use rustydss::nn::TwoLayerNet;
use rustydss::selection::{
    class_budgets, lazy_greedy, naive_greedy, FacilityLocation, SelectionContext, SelectionError,
    SelectionInputs, Strategy,
};
use std::collections::BTreeSet;

fn points(n: usize, d: usize) -> impl PropStrategy<Value = Array2<f32>> {
    prop::collection::vec(-10.0f32..10.0, n * d)
        .prop_map(move |v| Array2::from_shape_vec((n, d), v).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn naive_and_lazy_agree_on_facility_location(x in (2usize..14, 1usize..4).prop_flat_map(|(n, d)| points(n, d))) {
        let n = x.nrows();
        let all: Vec<usize> = (0..n).collect();
        for b in 1..=n {
            let mut naive = FacilityLocation::from_features(&x).unwrap();
            let mut lazy = FacilityLocation::from_features(&x).unwrap();
            let a = naive_greedy(&mut naive, &all, b).unwrap();
            let l = lazy_greedy(&mut lazy, &all, b).unwrap();
            prop_assert_eq!(&a, &l, "budget {}", b);
            prop_assert_eq!(a.len(), b);
        }
    }

    #[test]
    fn craig_budgets_sum_to_budget(
        counts in prop::collection::vec(1usize..500, 1..8),
        frac in 0.0f64..1.0,
    ) {
        let total: usize = counts.iter().sum();
        let budget = ((total as f64 * frac) as usize).clamp(1, total);
        let budgets = class_budgets(&counts, budget).unwrap();
        prop_assert_eq!(budgets.iter().sum::<usize>(), budget);
        for (b, c) in budgets.iter().zip(&counts) {
            // floor share plus at most one, never more than the class holds
            prop_assert!(b <= c);
            prop_assert!(*b >= budget * c / total);
        }
    }

    #[test]
    fn budget_outside_pool_is_configuration_error(n in 1usize..20, extra in 1usize..5) {
        let x = Array2::<f32>::zeros((n, 2));
        let all: Vec<usize> = (0..n).collect();
        let mut fl = FacilityLocation::from_features(&x).unwrap();
        prop_assert!(matches!(lazy_greedy(&mut fl, &all, 0), Err(SelectionError::Configuration(_))));
        prop_assert!(matches!(naive_greedy(&mut fl, &all, n + extra), Err(SelectionError::Configuration(_))));
    }
}

struct Fixture {
    splits: rustydss::data::DatasetSplits,
    net: TwoLayerNet,
}

fn fixture() -> Fixture {
    let splits = SyntheticConfig::new(100, 3, 3).with_seed(11).generate().unwrap();
    Fixture {
        net: TwoLayerNet::new(3, 6, 3),
        splits,
    }
}

fn inputs<'a>(f: &'a Fixture, current: &'a [usize]) -> SelectionInputs<'a> {
    SelectionInputs {
        model: &f.net,
        train: &f.splits.train,
        val: &f.splits.val,
        lr: 0.05,
        batch_size: 32,
        epoch: 9,
        current,
    }
}

#[test]
fn random_greedy_has_exact_size_and_no_overlap() {
    let f = fixture();
    let state = f.net.init_parameters(&mut StdRng::seed_from_u64(42));
    for budget in [1, 9, 10, 25, 99] {
        let sel = Strategy::RandomGreedy
            .select(budget, &state, &inputs(&f, &[]), &mut SelectionContext::new(0))
            .unwrap();
        assert_eq!(sel.len(), budget);
        let unique: BTreeSet<_> = sel.indices.iter().collect();
        assert_eq!(unique.len(), budget, "greedy and random parts overlap");
    }
}

#[test]
fn selection_is_idempotent_for_same_snapshot_and_seed() {
    let f = fixture();
    let state = f.net.init_parameters(&mut StdRng::seed_from_u64(42));
    let strategies = [
        Strategy::Random,
        Strategy::OnlineRandom,
        Strategy::FacilityLocation,
        Strategy::TaylorOnline,
        Strategy::RandomGreedy,
        Strategy::Craig { convex: false },
    ];
    for st in strategies {
        let a = st.select(20, &state, &inputs(&f, &[]), &mut SelectionContext::new(5)).unwrap();
        let b = st.select(20, &state, &inputs(&f, &[]), &mut SelectionContext::new(5)).unwrap();
        assert_eq!(a, b, "{}", st);
    }
}

#[test]
fn full_budget_selects_whole_pool_without_oracle_calls() {
    let f = fixture();
    let n = f.splits.train.len();
    let all: Vec<usize> = (0..n).collect();
    let mut fl = FacilityLocation::from_features(f.splits.train.features()).unwrap();
    assert_eq!(lazy_greedy(&mut fl, &all, n).unwrap(), all);
    assert_eq!(fl.oracle_calls(), 0);
    assert_eq!(naive_greedy(&mut fl, &all, n).unwrap(), all);
    assert_eq!(fl.oracle_calls(), 0);

    let state = f.net.init_parameters(&mut StdRng::seed_from_u64(1));
    let sel = Strategy::TaylorOnline
        .select(n, &state, &inputs(&f, &[]), &mut SelectionContext::new(0))
        .unwrap();
    assert_eq!(sel.indices, all);
}

#[test]
fn strategies_reject_bad_budgets() {
    let f = fixture();
    let n = f.splits.train.len();
    let state = f.net.init_parameters(&mut StdRng::seed_from_u64(1));
    for st in [Strategy::Random, Strategy::FacilityLocation, Strategy::TaylorOnline, Strategy::Craig { convex: false }] {
        for budget in [0, n + 1] {
            let err = st
                .select(budget, &state, &inputs(&f, &[]), &mut SelectionContext::new(0))
                .unwrap_err();
            assert!(matches!(err, SelectionError::Configuration(_)), "{} budget {}", st, budget);
        }
    }
}
