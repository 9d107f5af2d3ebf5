//  src/main.rs
//! Точка входа: отбор подмножеств на одном датасете всеми стратегиями.

use clap::Parser;
use log::{error, info};
use rustydss::data::FileLoader;
use rustydss::experiment::{run_experiment, ExperimentConfig};
use rustydss::trainer::{TrainConfig, WarmStart};
use std::path::PathBuf;
use std::process::ExitCode;

/// Аргументы командной строки
#[derive(Parser, Debug)]
#[command(author, version, about = "RustyDSS: data subset selection for accelerated training", long_about = None)]
struct Args {
    /// Директория с файлами датасета
    datadir: PathBuf,
    /// Имя датасета (dna, linsep, satimage, svmguide1, synthetic)
    dataset_name: String,
    /// Доля обучающей выборки в подмножестве, (0, 1]
    fraction: f64,
    /// Число эпох обучения
    num_epochs: usize,
    /// Интервал переотбора в эпохах
    selection_interval: usize,
    /// Тег признаков, попадает только в путь результатов
    feature_flag: String,
    /// 0: старт со случайного подмножества, 1: один шаг отбора до обучения
    warm_start_mode: u8,
    /// Число повторов эксперимента
    num_runs: usize,
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let train = TrainConfig::default()
        .with_fraction(args.fraction)
        .with_num_epochs(args.num_epochs)
        .with_select_every(args.selection_interval)
        .with_feature(args.feature_flag)
        .with_warm_start(WarmStart::from_flag(args.warm_start_mode)?)
        .with_num_runs(args.num_runs);
    train.validate()?;

    let config = ExperimentConfig::new(args.datadir, args.dataset_name, train);
    let outcome = run_experiment(&config, &FileLoader::new())?;
    for dir in &outcome.output_dirs {
        info!("Результаты: {}", dir.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_arguments_only() {
        let args = Args::try_parse_from([
            "rustydss", "data", "linsep", "0.1", "200", "20", "dss", "1", "3",
        ])
        .unwrap();
        assert_eq!(args.dataset_name, "linsep");
        assert_eq!(args.warm_start_mode, 1);
        assert_eq!(args.num_runs, 3);

        assert!(Args::try_parse_from(["rustydss", "data", "linsep", "0.1"]).is_err());
        assert!(Args::try_parse_from([
            "rustydss", "data", "linsep", "0.1", "200", "20", "dss", "1", "3",
            "--results-dir", "out",
        ])
        .is_err());
    }
}
