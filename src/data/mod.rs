//! # Data Module
//!
//! In-memory datasets, samplers, scaling and dataset loaders for the training
//! and selection pipeline.
//!
//! ## Key Components
//!
//! - [`Dataset`]: Trait for defining data sources
//! - [`InMemoryDataset`]: Dense features plus zero-based class labels
//! - [`PoolBatches`]: Batched walk over an index pool, plus sampling without replacement
//! - [`Transform`]: Feature transformations ([`StandardScaler`])
//! - [`DatasetLoader`]: Collaborator that produces train/val/test splits
//!
//! ## Example
//!
//! ```ignore
//! use rustydss::data::{load_dataset, Dataset};
//!
//! let splits = load_dataset("dna", "./data".as_ref())?;
//! println!("{} train points, {} classes", splits.train.len(), splits.num_classes);
//!
//! for class_indices in splits.train.class_partition() {
//!     // per-class selection
//! }
//! ```

pub mod dataset;
pub mod loader;
pub mod sampler;
pub mod synthetic;
pub mod transforms;

use std::path::PathBuf;
use thiserror::Error;

pub use dataset::{train_test_split, Dataset, InMemoryDataset};
pub use loader::{load_dataset, DatasetLoader, DatasetSplits, FileLoader};
pub use sampler::{sample_without_replacement, PoolBatches};
pub use synthetic::SyntheticConfig;
pub use transforms::{StandardScaler, Transform};

/// Errors produced while building or loading datasets.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Ошибка чтения '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Несовпадение размеров: {0}")]
    ShapeMismatch(String),

    #[error("Неизвестный датасет: '{0}'")]
    UnknownDataset(String),

    #[error("Метка {label} вне диапазона [0, {num_classes})")]
    InvalidLabel { label: i64, num_classes: usize },

    #[error("Некорректные параметры данных: {0}")]
    InvalidConfig(String),
}

pub type DataResult<T> = std::result::Result<T, DataError>;
