//! Загрузка именованных датасетов с диска.
//!
//! Каждый датасет реестра описан своими файлами (`.trn`, `.val`, `.tst`) в
//! формате libsvm, размерностью и смещением меток. Признаки стандартизуются
//! по статистикам обучающей части.

use crate::data::synthetic::SyntheticConfig;
use crate::data::{
    train_test_split, DataError, DataResult, Dataset, InMemoryDataset, StandardScaler, Transform,
};
use log::{debug, info};
use ndarray::Array2;
use std::fs;
use std::path::Path;

/// Обучающая, валидационная и тестовая части одного датасета.
#[derive(Debug, Clone)]
pub struct DatasetSplits {
    pub train: InMemoryDataset,
    pub val: InMemoryDataset,
    pub test: InMemoryDataset,
    pub num_classes: usize,
}

impl DatasetSplits {
    pub fn num_features(&self) -> usize {
        self.train.num_features()
    }
}

/// Источник датасетов по имени.
pub trait DatasetLoader {
    fn load(&self, name: &str, dir: &Path) -> DataResult<DatasetSplits>;
}

/// Запись реестра: где лежат файлы и как их читать.
#[derive(Debug, Clone)]
struct RegistryEntry {
    name: &'static str,
    train_file: &'static str,
    /// `None`: валидационная часть отделяется от обучающей (10%, seed 42).
    val_file: Option<&'static str>,
    test_file: &'static str,
    num_features: usize,
    num_classes: usize,
    /// Вычитается из меток в файле, чтобы первый класс был нулевым.
    label_offset: i64,
}

const REGISTRY: &[RegistryEntry] = &[
    RegistryEntry {
        name: "dna",
        train_file: "dna.scale.trn",
        val_file: Some("dna.scale.val"),
        test_file: "dna.scale.tst",
        num_features: 180,
        num_classes: 3,
        label_offset: 1,
    },
    RegistryEntry {
        name: "linsep",
        train_file: "linsep.trn",
        val_file: Some("linsep.val"),
        test_file: "linsep.tst",
        num_features: 2,
        num_classes: 2,
        label_offset: 0,
    },
    RegistryEntry {
        name: "satimage",
        train_file: "satimage.scale.trn",
        val_file: Some("satimage.scale.val"),
        test_file: "satimage.scale.tst",
        num_features: 36,
        num_classes: 6,
        label_offset: 1,
    },
    RegistryEntry {
        name: "svmguide1",
        train_file: "svmguide1.trn_full",
        val_file: None,
        test_file: "svmguide1.tst",
        num_features: 4,
        num_classes: 2,
        label_offset: 0,
    },
];

/// Имя датасета, который генерируется, а не читается с диска.
pub const SYNTHETIC: &str = "synthetic";

/// Загрузчик файлов из реестра известных датасетов.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader;

impl FileLoader {
    pub fn new() -> Self {
        FileLoader
    }

    fn read_split(entry: &RegistryEntry, path: &Path) -> DataResult<InMemoryDataset> {
        let text = fs::read_to_string(path).map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let (features, raw_labels) = parse_libsvm(&text, entry.num_features, path)?;
        let labels = raw_labels
            .into_iter()
            .map(|raw| {
                let y = raw - entry.label_offset;
                if y < 0 || y as usize >= entry.num_classes {
                    Err(DataError::InvalidLabel {
                        label: y,
                        num_classes: entry.num_classes,
                    })
                } else {
                    Ok(y as usize)
                }
            })
            .collect::<DataResult<Vec<_>>>()?;
        debug!("{}: {} строк", path.display(), labels.len());
        InMemoryDataset::new(features, labels, entry.num_classes)
    }
}

impl DatasetLoader for FileLoader {
    fn load(&self, name: &str, dir: &Path) -> DataResult<DatasetSplits> {
        if name == SYNTHETIC {
            return SyntheticConfig::default().generate();
        }
        let entry = REGISTRY
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| DataError::UnknownDataset(name.to_string()))?;

        let full_train = Self::read_split(entry, &dir.join(entry.train_file))?;
        let test = Self::read_split(entry, &dir.join(entry.test_file))?;
        let (train, val) = match entry.val_file {
            Some(file) => (full_train, Self::read_split(entry, &dir.join(file))?),
            None => train_test_split(&full_train, 0.1, 42)?,
        };

        let splits = scale_splits(train, val, test, entry.num_classes)?;
        info!(
            "Датасет '{}': train {}, val {}, test {}, {} признаков, {} классов",
            name,
            splits.train.len(),
            splits.val.len(),
            splits.test.len(),
            splits.num_features(),
            splits.num_classes
        );
        Ok(splits)
    }
}

/// Стандартизует все три части по статистикам обучающей.
pub(crate) fn scale_splits(
    train: InMemoryDataset,
    val: InMemoryDataset,
    test: InMemoryDataset,
    num_classes: usize,
) -> DataResult<DatasetSplits> {
    let scaler = StandardScaler::fit(train.features())?;
    let scaled = |ds: &InMemoryDataset| -> DataResult<InMemoryDataset> {
        let x = scaler.apply(ds.features())?;
        Ok(ds.map_features(|_| x))
    };
    Ok(DatasetSplits {
        train: scaled(&train)?,
        val: scaled(&val)?,
        test: scaled(&test)?,
        num_classes,
    })
}

/// Загружает датасет по имени: `"synthetic"` генерируется, остальные
/// читаются из `dir` через [`FileLoader`].
pub fn load_dataset(name: &str, dir: &Path) -> DataResult<DatasetSplits> {
    FileLoader::new().load(name, dir)
}

fn parse_error(path: &Path, line: usize, message: impl Into<String>) -> DataError {
    DataError::Parse {
        path: path.to_path_buf(),
        line,
        message: message.into(),
    }
}

fn parse_label(token: &str, path: &Path, line: usize) -> DataResult<i64> {
    let value: f64 = token
        .parse()
        .map_err(|_| parse_error(path, line, format!("некорректная метка '{}'", token)))?;
    if value.fract() != 0.0 {
        return Err(parse_error(path, line, format!("метка '{}' не целая", token)));
    }
    Ok(value as i64)
}

/// Разбирает разреженный формат libsvm в плотную матрицу.
pub(crate) fn parse_libsvm(
    text: &str,
    num_features: usize,
    path: &Path,
) -> DataResult<(Array2<f32>, Vec<i64>)> {
    let mut values = Vec::new();
    let mut labels = Vec::new();
    for (lineno, line) in text.lines().enumerate().map(|(i, l)| (i + 1, l.trim())) {
        if line.is_empty() {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let label_token = tokens
            .next()
            .ok_or_else(|| parse_error(path, lineno, "пустая строка"))?;
        labels.push(parse_label(label_token, path, lineno)?);

        let mut row = vec![0.0f32; num_features];
        for token in tokens {
            let (idx, val) = token
                .split_once(':')
                .ok_or_else(|| parse_error(path, lineno, format!("ожидалось idx:value, получено '{}'", token)))?;
            let idx: usize = idx
                .parse()
                .map_err(|_| parse_error(path, lineno, format!("некорректный индекс '{}'", idx)))?;
            if idx == 0 || idx > num_features {
                return Err(parse_error(
                    path,
                    lineno,
                    format!("индекс {} вне [1, {}]", idx, num_features),
                ));
            }
            row[idx - 1] = val
                .parse()
                .map_err(|_| parse_error(path, lineno, format!("некорректное значение '{}'", val)))?;
        }
        values.extend(row);
    }
    let n = labels.len();
    let features = Array2::from_shape_vec((n, num_features), values)
        .map_err(|e| DataError::ShapeMismatch(e.to_string()))?;
    Ok((features, labels))
}
