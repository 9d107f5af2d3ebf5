//! Catalogue of selection strategies and the state they share across rounds.

use crate::data::{sample_without_replacement, Dataset, InMemoryDataset};
use crate::nn::{ModelSnapshot, TwoLayerNet};
use crate::selection::craig::select_class_wise;
use crate::selection::facility_location::FacilityLocation;
use crate::selection::greedy::{lazy_greedy, naive_greedy};
use crate::selection::taylor::TaylorOracle;
use crate::selection::{validate_budget, Selection, SelectionError, SelectionResult};
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A subset selection method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Train on the whole training set.
    FullTraining,
    /// One uniform random subset for the whole run.
    Random,
    /// A fresh uniform random subset at every checkpoint.
    OnlineRandom,
    /// Facility location on the input features, selected once.
    FacilityLocation,
    /// One-step Taylor greedy at every checkpoint.
    TaylorOnline,
    /// Taylor greedy against validation augmented with facility-location points.
    FaclocRegularized,
    /// 90% Taylor greedy, 10% uniform from the rest.
    RandomGreedy,
    /// Taylor greedy that grows the subset by a fixed step per checkpoint.
    Stepwise,
    /// Class-wise facility location on logit gradients with gamma weights.
    /// `convex == true` selects once at the start.
    Craig { convex: bool },
}

impl Strategy {
    /// Every method the experiment driver runs.
    pub fn all() -> Vec<Strategy> {
        vec![
            Strategy::FullTraining,
            Strategy::Random,
            Strategy::OnlineRandom,
            Strategy::FacilityLocation,
            Strategy::TaylorOnline,
            Strategy::FaclocRegularized,
            Strategy::RandomGreedy,
            Strategy::Stepwise,
            Strategy::Craig { convex: false },
        ]
    }

    /// Human-readable name used in logs and in the run table.
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::FullTraining => "Full Training",
            Strategy::Random => "Random",
            Strategy::OnlineRandom => "Online Random",
            Strategy::FacilityLocation => "Facility Location",
            Strategy::TaylorOnline => "Taylor Online",
            Strategy::FaclocRegularized => "Facloc Regularized",
            Strategy::RandomGreedy => "Random Greedy",
            Strategy::Stepwise => "Stepwise",
            Strategy::Craig { convex: false } => "CRAIG",
            Strategy::Craig { convex: true } => "CRAIG (convex)",
        }
    }

    /// Prefix of the per-method artifact files.
    pub fn file_stem(&self) -> &'static str {
        match self {
            Strategy::FullTraining => "full",
            Strategy::Random => "random",
            Strategy::OnlineRandom => "online_random",
            Strategy::FacilityLocation => "facloc",
            Strategy::TaylorOnline => "one_step",
            Strategy::FaclocRegularized => "facloc_reg_one_step",
            Strategy::RandomGreedy => "rand_reg_one_step",
            Strategy::Stepwise => "stepwise_one_step",
            Strategy::Craig { convex: false } => "craig",
            Strategy::Craig { convex: true } => "craig_convex",
        }
    }

    /// Whether the subset is re-selected at every checkpoint.
    pub fn reselects(&self) -> bool {
        match self {
            Strategy::FullTraining | Strategy::Random | Strategy::FacilityLocation => false,
            Strategy::Craig { convex } => !convex,
            _ => true,
        }
    }

    /// Strategies driven by the Taylor oracle (they honour warm start).
    pub fn uses_taylor(&self) -> bool {
        matches!(
            self,
            Strategy::TaylorOnline
                | Strategy::FaclocRegularized
                | Strategy::RandomGreedy
                | Strategy::Stepwise
        )
    }

    /// Selects a subset on a frozen `snapshot`.
    ///
    /// `budget` is the per-call budget; stepwise ignores it and uses the step
    /// size stored in `ctx`.
    pub fn select(
        &self,
        budget: usize,
        snapshot: &ModelSnapshot,
        inputs: &SelectionInputs<'_>,
        ctx: &mut SelectionContext,
    ) -> SelectionResult<Selection> {
        let n = inputs.train.len();
        let all: Vec<usize> = (0..n).collect();

        let selection = match self {
            Strategy::FullTraining => Selection::new(all),
            Strategy::Random => {
                validate_budget(budget, n)?;
                Selection::new(sample_without_replacement(&mut ctx.rng, &all, budget))
            }
            Strategy::OnlineRandom => {
                validate_budget(budget, n)?;
                let seed = inputs.epoch as u64;
                let picked =
                    ctx.with_saved_state(seed, |rng| sample_without_replacement(rng, &all, budget));
                Selection::new(picked)
            }
            Strategy::FacilityLocation => {
                validate_budget(budget, n)?;
                if budget == n {
                    Selection::new(all)
                } else {
                    let mut objective = FacilityLocation::from_features(inputs.train.features())?;
                    let picked = lazy_greedy(&mut objective, &all, budget)?;
                    debug!("Facility location: {} вызовов оракула", objective.oracle_calls());
                    Selection::new(picked)
                }
            }
            Strategy::TaylorOnline | Strategy::FaclocRegularized => {
                Selection::new(taylor_greedy(budget, snapshot, inputs, &all)?)
            }
            Strategy::RandomGreedy => {
                validate_budget(budget, n)?;
                if budget == n {
                    Selection::new(all)
                } else {
                    let greedy_part = budget * 9 / 10;
                    let mut picked = if greedy_part > 0 {
                        taylor_greedy(greedy_part, snapshot, inputs, &all)?
                    } else {
                        Vec::new()
                    };
                    let taken: BTreeSet<usize> = picked.iter().copied().collect();
                    let rest: Vec<usize> = all.into_iter().filter(|i| !taken.contains(i)).collect();
                    picked.extend(sample_without_replacement(
                        &mut ctx.rng,
                        &rest,
                        budget - greedy_part,
                    ));
                    Selection::new(picked)
                }
            }
            Strategy::Stepwise => {
                if ctx.step_budget == 0 {
                    return Err(SelectionError::Configuration(
                        "пошаговый отбор не инициализирован".to_string(),
                    ));
                }
                if ctx.rounds_left == 0 {
                    debug!("Stepwise: расписание исчерпано, подмножество не меняется");
                    return Ok(Selection::new(inputs.current.to_vec()));
                }
                let pool: Vec<usize> = ctx.remaining.iter().copied().collect();
                let added = taylor_greedy(ctx.step_budget, snapshot, inputs, &pool)?;
                for i in &added {
                    ctx.remaining.remove(i);
                }
                ctx.rounds_left -= 1;
                let mut indices = inputs.current.to_vec();
                indices.extend(added);
                Selection::new(indices)
            }
            Strategy::Craig { .. } => select_class_wise(inputs.model, snapshot, inputs.train, budget)?,
        };

        ctx.round += 1;
        debug!(
            "{}: раунд {}, отобрано {} точек",
            self.name(),
            ctx.round,
            selection.len()
        );
        Ok(selection)
    }
}

/// Taylor greedy over `pool`; returns training indices in pick order.
fn taylor_greedy(
    budget: usize,
    snapshot: &ModelSnapshot,
    inputs: &SelectionInputs<'_>,
    pool: &[usize],
) -> SelectionResult<Vec<usize>> {
    validate_budget(budget, pool.len())?;
    if budget == pool.len() {
        return Ok(pool.to_vec());
    }
    let mut oracle = TaylorOracle::new(
        inputs.model,
        snapshot,
        inputs.train,
        pool,
        inputs.val,
        inputs.lr,
        inputs.batch_size,
    )?;
    let local: Vec<usize> = (0..pool.len()).collect();
    let picked = naive_greedy(&mut oracle, &local, budget)?;
    Ok(picked.into_iter().map(|k| pool[k]).collect())
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = SelectionError;

    /// Accepts either the display name or the file stem, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        let mut known = Strategy::all();
        known.push(Strategy::Craig { convex: true });
        known
            .into_iter()
            .find(|st| st.name().to_lowercase() == wanted || st.file_stem() == wanted)
            .ok_or_else(|| SelectionError::Configuration(format!("неизвестная стратегия '{}'", s)))
    }
}

/// Read-only inputs of one selection call.
#[derive(Debug, Clone, Copy)]
pub struct SelectionInputs<'a> {
    pub model: &'a TwoLayerNet,
    pub train: &'a InMemoryDataset,
    /// Validation set the Taylor oracle scores against.
    pub val: &'a InMemoryDataset,
    pub lr: f32,
    /// Batch size for precomputing training gradients.
    pub batch_size: usize,
    /// Epoch at which the call happens (seeds online random).
    pub epoch: usize,
    /// Subset active before this call.
    pub current: &'a [usize],
}

/// State owned by one run and threaded through all of its selection calls.
#[derive(Debug, Clone)]
pub struct SelectionContext {
    rng: StdRng,
    remaining: BTreeSet<usize>,
    step_budget: usize,
    rounds_left: usize,
    round: usize,
}

impl SelectionContext {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            remaining: BTreeSet::new(),
            step_budget: 0,
            rounds_left: 0,
            round: 0,
        }
    }

    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Number of completed selection calls.
    pub fn round(&self) -> usize {
        self.round
    }

    /// Stepwise pool of indices not yet selected.
    pub fn remaining(&self) -> &BTreeSet<usize> {
        &self.remaining
    }

    pub fn step_budget(&self) -> usize {
        self.step_budget
    }

    pub fn rounds_left(&self) -> usize {
        self.rounds_left
    }

    /// Runs `f` with a generator seeded by `seed`; the context generator is
    /// left exactly as it was.
    pub fn with_saved_state<T>(&mut self, seed: u64, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let saved = std::mem::replace(&mut self.rng, StdRng::seed_from_u64(seed));
        let out = f(&mut self.rng);
        self.rng = saved;
        out
    }

    /// Prepares stepwise selection and returns the initial random step.
    ///
    /// Step size is `ceil(budget * select_every / num_epochs)` and the
    /// schedule has `num_epochs / select_every` increments. Fails if the
    /// initial step plus all increments cannot fit in `n` points.
    pub fn init_stepwise(
        &mut self,
        n: usize,
        budget: usize,
        select_every: usize,
        num_epochs: usize,
    ) -> SelectionResult<Vec<usize>> {
        if select_every == 0 || num_epochs == 0 {
            return Err(SelectionError::Configuration(
                "интервал отбора и число эпох должны быть положительными".to_string(),
            ));
        }
        let step = (budget * select_every).div_ceil(num_epochs);
        let rounds = num_epochs / select_every;
        validate_budget(step, n)?;
        if (rounds + 1) * step > n {
            return Err(SelectionError::Configuration(format!(
                "пошаговый отбор: {} шагов по {} не помещаются в {} точек",
                rounds + 1,
                step,
                n
            )));
        }

        let all: Vec<usize> = (0..n).collect();
        let initial = sample_without_replacement(&mut self.rng, &all, step);
        self.remaining = all.into_iter().collect();
        for i in &initial {
            self.remaining.remove(i);
        }
        self.step_budget = step;
        self.rounds_left = rounds;
        Ok(initial)
    }
}
