//! Facility location objective `f(S) = sum_j max_{s in S} sim(j, s)`.
//!
//! Similarities are `max_dist - ||x_j - x_s||^2`, so every entry is
//! non-negative and `f(empty) = 0`. The ground set and the covered points are
//! the same pool; ids are row/column positions in the similarity matrix.

use crate::selection::greedy::MarginalGain;
use crate::selection::{SelectionError, SelectionResult};
use ndarray::{Array1, Array2, Axis};

#[derive(Debug, Clone)]
pub struct FacilityLocation {
    /// `sim[[j, c]]`: how well candidate `c` represents point `j`.
    sim: Array2<f32>,
    /// Current coverage `max_{s in S} sim(j, s)` of every point.
    coverage: Vec<f64>,
    selected: Vec<usize>,
    oracle_calls: usize,
}

/// Squared euclidean distances between all rows of `x`.
pub fn pairwise_sq_distances(x: &Array2<f32>) -> Array2<f32> {
    let norms: Array1<f32> = x.map_axis(Axis(1), |row| row.dot(&row));
    let mut dist = x.dot(&x.t());
    for ((i, j), d) in dist.indexed_iter_mut() {
        *d = (norms[i] + norms[j] - 2.0 * *d).max(0.0);
    }
    dist
}

impl FacilityLocation {
    /// Builds the objective from feature rows (one row per pool point).
    pub fn from_features(x: &Array2<f32>) -> SelectionResult<Self> {
        let dist = pairwise_sq_distances(x);
        let max_dist = dist.iter().copied().fold(0.0f32, f32::max);
        Self::from_similarity(dist.mapv(|d| max_dist - d))
    }

    /// Builds the objective from a precomputed square similarity matrix.
    pub fn from_similarity(sim: Array2<f32>) -> SelectionResult<Self> {
        if sim.nrows() != sim.ncols() {
            return Err(SelectionError::Configuration(format!(
                "матрица сходства должна быть квадратной, получено {:?}",
                sim.shape()
            )));
        }
        if sim.iter().any(|v| !v.is_finite()) {
            return Err(SelectionError::Numeric(
                "матрица сходства содержит нечисловые значения".to_string(),
            ));
        }
        let n = sim.nrows();
        Ok(Self {
            sim,
            coverage: vec![0.0; n],
            selected: Vec::new(),
            oracle_calls: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.coverage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coverage.is_empty()
    }

    /// Value of the committed subset.
    pub fn value(&self) -> f64 {
        self.coverage.iter().sum()
    }

    /// Value of an arbitrary subset, independent of the committed state.
    pub fn evaluate(&self, subset: &[usize]) -> f64 {
        self.sim
            .axis_iter(Axis(0))
            .map(|row| {
                subset
                    .iter()
                    .map(|&s| row[s] as f64)
                    .fold(0.0, f64::max)
            })
            .sum()
    }

    pub fn selected(&self) -> &[usize] {
        &self.selected
    }

    /// Number of `marginal_gain` evaluations so far.
    pub fn oracle_calls(&self) -> usize {
        self.oracle_calls
    }

    /// For each selected point, how many pool points it is the most similar
    /// selected point for. Ties go to the earlier entry of `selected`.
    pub fn gammas(&self, selected: &[usize]) -> Vec<f32> {
        let mut counts = vec![0.0f32; selected.len()];
        if selected.is_empty() {
            return counts;
        }
        for row in self.sim.axis_iter(Axis(0)) {
            let mut best = 0;
            for (k, &s) in selected.iter().enumerate().skip(1) {
                if row[s] > row[selected[best]] {
                    best = k;
                }
            }
            counts[best] += 1.0;
        }
        counts
    }
}

impl MarginalGain for FacilityLocation {
    fn marginal_gain(&mut self, candidate: usize) -> f64 {
        self.oracle_calls += 1;
        self.sim
            .column(candidate)
            .iter()
            .zip(&self.coverage)
            .map(|(&s, &cov)| (s as f64 - cov).max(0.0))
            .sum()
    }

    fn commit(&mut self, candidate: usize) -> SelectionResult<()> {
        if candidate >= self.len() {
            return Err(SelectionError::Configuration(format!(
                "кандидат {} вне пула из {}",
                candidate,
                self.len()
            )));
        }
        for (cov, &s) in self.coverage.iter_mut().zip(self.sim.column(candidate)) {
            *cov = cov.max(s as f64);
        }
        self.selected.push(candidate);
        Ok(())
    }
}
