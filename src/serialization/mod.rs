// --- Файл: src/serialization/mod.rs ---

//! Модуль для сохранения результатов запуска.
//!
//! Все файлы одного запуска лежат в
//! `results/<dataset>/<feature>/<fraction>/<interval>/`:
//! - `<dataset>.txt`: таблица точности и сводка потерь по методам
//! - `<method>_subset_selected.txt`: подмножество на каждой контрольной точке
//! - `<method>_grads.txt`: нормы градиента на контрольных точках
//! - `<dataset>_<fraction>_<category>_loss.json`: кривые потерь
//! - `config.json`: конфигурация запуска
//!
//! # Примеры
//!
//! ```rust,ignore
//! use rustydss::serialization::ArtifactWriter;
//!
//! let writer = ArtifactWriter::new("results", "dna", "dss", 0.1, 20);
//! let written = writer.write_all(&reports, &config)?;
//! ```

pub mod artifacts;

use std::path::PathBuf;
use thiserror::Error;

pub use artifacts::{format_list_literal, load_config, ArtifactWriter, LossCurves};

/// Ошибки при записи артефактов
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Ошибка ввода/вывода для {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Ошибка JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Файл не найден: {0}")]
    FileNotFound(PathBuf),
}

pub type ArtifactResult<T> = std::result::Result<T, ArtifactError>;
