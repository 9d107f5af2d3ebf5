// --- Файл: src/serialization/artifacts.rs ---

//! Запись артефактов запуска: подмножества, нормы градиентов, кривые потерь,
//! итоговая таблица и конфигурация.

use super::{ArtifactError, ArtifactResult};
use crate::trainer::{RunReport, TrainConfig};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Write as _};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Печатает срез как списковый литерал: `[1, 2, 3]`.
pub fn format_list_literal<T: Display>(values: &[T]) -> String {
    let mut out = String::with_capacity(values.len() * 4 + 2);
    out.push('[');
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{}", v);
    }
    out.push(']');
    out
}

/// Кривые потерь одной категории (`substrn`, `fulltrn`, `val`) для всех методов.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossCurves {
    pub dataset: String,
    pub fraction: f64,
    pub category: String,
    /// Имя файла метода -> потери по эпохам.
    pub series: BTreeMap<String, Vec<f32>>,
}

impl LossCurves {
    pub fn from_reports(dataset: &str, fraction: f64, category: &str, reports: &[RunReport]) -> Self {
        let series = reports
            .iter()
            .map(|r| {
                let losses = match category {
                    "substrn" => &r.substrn_losses,
                    "fulltrn" => &r.fulltrn_losses,
                    _ => &r.val_losses,
                };
                (r.strategy.file_stem().to_string(), losses.clone())
            })
            .collect();
        Self {
            dataset: dataset.to_string(),
            fraction,
            category: category.to_string(),
            series,
        }
    }
}

/// Категории кривых потерь.
pub const LOSS_CATEGORIES: [&str; 3] = ["substrn", "fulltrn", "val"];

/// Пишет артефакты одного запуска в свою директорию.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
    dataset: String,
    fraction: f64,
}

impl ArtifactWriter {
    /// Директория `root/<dataset>/<feature>/<fraction>/<interval>/`.
    pub fn new<P: AsRef<Path>>(root: P, dataset: &str, feature: &str, fraction: f64, interval: usize) -> Self {
        let dir = root
            .as_ref()
            .join(dataset)
            .join(feature)
            .join(fraction.to_string())
            .join(interval.to_string());
        Self {
            dir,
            dataset: dataset.to_string(),
            fraction,
        }
    }

    /// Тот же писатель, но в поддиректорию (например, `run_2`).
    pub fn nested(&self, name: &str) -> Self {
        Self {
            dir: self.dir.join(name),
            ..self.clone()
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_file(&self, name: &str, contents: &str) -> ArtifactResult<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|source| ArtifactError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.dir.join(name);
        let mut file = File::create(&path).map_err(|source| ArtifactError::Io {
            path: path.clone(),
            source,
        })?;
        file.write_all(contents.as_bytes())
            .map_err(|source| ArtifactError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    /// Одна строка на контрольную точку (первая - начальное подмножество).
    pub fn write_subsets(&self, report: &RunReport) -> ArtifactResult<PathBuf> {
        let mut text = String::new();
        for subset in &report.subset_history {
            text.push_str(&format_list_literal(subset));
            text.push('\n');
        }
        self.write_file(&format!("{}_subset_selected.txt", report.strategy.file_stem()), &text)
    }

    pub fn write_grads(&self, report: &RunReport) -> ArtifactResult<PathBuf> {
        let text = format!("{}\n", format_list_literal(&report.grad_norms));
        self.write_file(&format!("{}_grads.txt", report.strategy.file_stem()), &text)
    }

    pub fn write_loss_curves(&self, reports: &[RunReport]) -> ArtifactResult<Vec<PathBuf>> {
        LOSS_CATEGORIES
            .iter()
            .map(|category| -> ArtifactResult<PathBuf> {
                let curves = LossCurves::from_reports(&self.dataset, self.fraction, category, reports);
                let json = serde_json::to_string_pretty(&curves)?;
                self.write_file(
                    &format!("{}_{}_{}_loss.json", self.dataset, self.fraction, category),
                    &json,
                )
            })
            .collect()
    }

    /// `<dataset>.txt`: таблица точности и сводка потерь.
    pub fn write_summary(&self, reports: &[RunReport], config: &TrainConfig) -> ArtifactResult<PathBuf> {
        let mut text = String::new();
        let _ = writeln!(
            text,
            "Датасет {}, доля {}, эпох {}, интервал {}, lr {}",
            self.dataset, self.fraction, config.num_epochs, config.select_every, config.learning_rate
        );
        let _ = writeln!(
            text,
            "{:<20} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}",
            "Метод", "ValAcc", "TestAcc", "ValPrec", "ValRec", "TestPrec", "TestRec"
        );
        for r in reports {
            let e = &r.evaluation;
            let _ = writeln!(
                text,
                "{:<20} {:>9.2} {:>9.2} {:>9.4} {:>9.4} {:>9.4} {:>9.4}",
                r.strategy.name(),
                e.val_acc,
                e.test_acc,
                e.val_precision,
                e.val_recall,
                e.test_precision,
                e.test_recall
            );
        }
        text.push('\n');
        for r in reports {
            let e = &r.evaluation;
            let _ = writeln!(
                text,
                "{}: FullTrn {:.4}, SubTrn {:.4}, Val {:.4}, Test {:.4}, пропущено раундов {}",
                r.strategy.name(),
                e.fulltrn_loss,
                e.subtrn_loss,
                e.val_loss,
                e.test_loss,
                r.skipped_rounds
            );
        }
        self.write_file(&format!("{}.txt", self.dataset), &text)
    }

    pub fn write_config(&self, config: &TrainConfig) -> ArtifactResult<PathBuf> {
        let json = serde_json::to_string_pretty(config)?;
        self.write_file("config.json", &json)
    }

    /// Пишет все артефакты запуска и возвращает пути созданных файлов.
    pub fn write_all(&self, reports: &[RunReport], config: &TrainConfig) -> ArtifactResult<Vec<PathBuf>> {
        let mut written = Vec::new();
        for report in reports {
            written.push(self.write_subsets(report)?);
            written.push(self.write_grads(report)?);
        }
        written.extend(self.write_loss_curves(reports)?);
        written.push(self.write_summary(reports, config)?);
        written.push(self.write_config(config)?);
        info!("Записано {} файлов в {}", written.len(), self.dir.display());
        Ok(written)
    }
}

/// Загружает `config.json` из директории запуска.
pub fn load_config<P: AsRef<Path>>(dir: P) -> ArtifactResult<TrainConfig> {
    let path = dir.as_ref().join("config.json");
    if !path.exists() {
        return Err(ArtifactError::FileNotFound(path));
    }
    let mut text = String::new();
    File::open(&path)
        .and_then(|mut f| f.read_to_string(&mut text))
        .map_err(|source| ArtifactError::Io {
            path: path.clone(),
            source,
        })?;
    Ok(serde_json::from_str(&text)?)
}
