//! # RustyDSS: Data Subset Selection for accelerated training
//!
//! **RustyDSS** trains a small classifier on a budgeted subset of the training
//! set and periodically re-selects that subset with greedy set-function
//! maximization over a frozen model snapshot.
//!
//! Available selection strategies:
//!
//! - **Taylor online** (one-step greedy): first-order Taylor estimate of the
//!   validation loss decrease caused by each training point.
//! - **Facility location**: coverage objective over pairwise similarities,
//!   maximized with lazy greedy.
//! - **CRAIG**: class-stratified facility location over last-layer gradients,
//!   with per-point gamma weights.
//! - **Random greedy**, **Stepwise**, **Online random** and plain baselines.
//!
//! ## Usage Example
//!
//! ```no_run
//! use rustydss::data::synthetic::SyntheticConfig;
//! use rustydss::selection::Strategy;
//! use rustydss::trainer::{TrainConfig, Trainer};
//!
//! // 1. Data splits (any `DatasetLoader` works here)
//! let splits = SyntheticConfig::new(1000, 8, 3).generate().unwrap();
//!
//! // 2. Run configuration
//! let config = TrainConfig::new()
//!     .with_fraction(0.1)
//!     .with_num_epochs(50)
//!     .with_select_every(10);
//!
//! // 3. Train on a Taylor-selected subset
//! let trainer = Trainer::new(config, &splits).unwrap();
//! let start = trainer.initial_random_subset();
//! let report = trainer.run(Strategy::TaylorOnline, &start).unwrap();
//! println!("val acc: {:.2}", report.evaluation.val_acc);
//! ```

// Declare public modules that constitute the core library API.
pub mod data;
pub mod experiment;
pub mod losses;
pub mod metrics;
pub mod nn;
pub mod optimizers;
pub mod selection;
pub mod serialization;
pub mod trainer;
