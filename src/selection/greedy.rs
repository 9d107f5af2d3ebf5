//! Greedy maximization drivers.
//!
//! Both drivers take an objective behind [`MarginalGain`] and a list of
//! candidate ids, and return the picked ids in selection order.
//!
//! * `naive_greedy` re-scores every remaining candidate each iteration.
//! * `lazy_greedy` keeps a max-heap of stale gains and only re-scores the top.
//!   On a submodular objective it yields the same sequence as `naive_greedy`.
//!
//! Ties go to the smaller candidate id in both. Candidates whose gain is not
//! finite are skipped; if none is left before the budget is met the call
//! fails with [`SelectionError::OracleFailure`].

use crate::selection::{validate_budget, SelectionError, SelectionResult};
use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};

/// Objective queried by the greedy drivers.
pub trait MarginalGain {
    /// Gain of adding `candidate` to the currently committed subset.
    fn marginal_gain(&mut self, candidate: usize) -> f64;

    /// Adds `candidate` to the committed subset.
    fn commit(&mut self, candidate: usize) -> SelectionResult<()>;
}

fn unique_candidates(candidates: &[usize]) -> SelectionResult<BTreeSet<usize>> {
    let set: BTreeSet<usize> = candidates.iter().copied().collect();
    if set.len() != candidates.len() {
        return Err(SelectionError::Configuration(
            "пул кандидатов содержит повторы".to_string(),
        ));
    }
    Ok(set)
}

/// Plain greedy: every iteration scans all remaining candidates.
pub fn naive_greedy<G: MarginalGain + ?Sized>(
    objective: &mut G,
    candidates: &[usize],
    budget: usize,
) -> SelectionResult<Vec<usize>> {
    validate_budget(budget, candidates.len())?;
    let mut remaining = unique_candidates(candidates)?;
    if budget == candidates.len() {
        return Ok(candidates.to_vec());
    }

    let mut selected = Vec::with_capacity(budget);
    while selected.len() < budget {
        let mut best: Option<(usize, f64)> = None;
        // Ascending scan + strict comparison keeps the smallest id on ties.
        for &c in &remaining {
            let gain = objective.marginal_gain(c);
            if !gain.is_finite() {
                continue;
            }
            match best {
                Some((_, best_gain)) if gain.total_cmp(&best_gain) != Ordering::Greater => {}
                _ => best = Some((c, gain)),
            }
        }
        let (pick, _) = best.ok_or(SelectionError::OracleFailure {
            selected: selected.len(),
            budget,
        })?;
        objective.commit(pick)?;
        remaining.remove(&pick);
        selected.push(pick);
    }
    Ok(selected)
}

#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    gain: f64,
    index: usize,
    /// Number of commits at the time `gain` was computed.
    stamp: usize,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.gain
            .total_cmp(&other.gain)
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

/// Lazy (accelerated) greedy for submodular objectives.
pub fn lazy_greedy<G: MarginalGain + ?Sized>(
    objective: &mut G,
    candidates: &[usize],
    budget: usize,
) -> SelectionResult<Vec<usize>> {
    validate_budget(budget, candidates.len())?;
    unique_candidates(candidates)?;
    if budget == candidates.len() {
        return Ok(candidates.to_vec());
    }

    let mut heap: BinaryHeap<HeapEntry> = candidates
        .iter()
        .filter_map(|&index| {
            let gain = objective.marginal_gain(index);
            gain.is_finite().then_some(HeapEntry {
                gain,
                index,
                stamp: 0,
            })
        })
        .collect();

    let mut selected = Vec::with_capacity(budget);
    while selected.len() < budget {
        let top = heap.pop().ok_or(SelectionError::OracleFailure {
            selected: selected.len(),
            budget,
        })?;

        if top.stamp != selected.len() {
            let gain = objective.marginal_gain(top.index);
            if !gain.is_finite() {
                continue;
            }
            let fresh = HeapEntry {
                gain,
                index: top.index,
                stamp: selected.len(),
            };
            if matches!(heap.peek(), Some(next) if fresh < *next) {
                heap.push(fresh);
                continue;
            }
        }

        objective.commit(top.index)?;
        selected.push(top.index);
    }
    Ok(selected)
}
