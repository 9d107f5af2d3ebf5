// --- Файл: src/data/sampler.rs ---

//! Обход пула индексов батчами и случайная выборка из пула.

use rand::seq::index;
use rand::Rng;

/// Последовательные батчи из пула номеров примеров.
///
/// Каждый элемент - `(offset, ids)`: `ids` это `pool[offset..offset + len]`.
/// Последний батч может быть короче `batch_size`.
#[derive(Debug, Clone)]
pub struct PoolBatches<'a> {
    pool: &'a [usize],
    batch_size: usize,
    offset: usize,
}

impl<'a> PoolBatches<'a> {
    /// `batch_size == 0` трактуется как 1.
    pub fn new(pool: &'a [usize], batch_size: usize) -> Self {
        Self {
            pool,
            batch_size: batch_size.max(1),
            offset: 0,
        }
    }

    /// Количество батчей за полный проход.
    pub fn num_batches(&self) -> usize {
        self.pool.len().div_ceil(self.batch_size)
    }
}

impl<'a> Iterator for PoolBatches<'a> {
    type Item = (usize, &'a [usize]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.pool.len() {
            return None;
        }
        let start = self.offset;
        let end = (start + self.batch_size).min(self.pool.len());
        self.offset = end;
        Some((start, &self.pool[start..end]))
    }
}

/// Равномерно выбирает `amount` различных элементов из `pool` без возвращения.
///
/// Порядок результата определяется генератором. Вызывающий код обязан
/// проверить `amount <= pool.len()` заранее (бюджет отбора проверяется до
/// выборки); в релизной сборке больший `amount` урезается до размера пула.
pub fn sample_without_replacement<R: Rng + ?Sized>(
    rng: &mut R,
    pool: &[usize],
    amount: usize,
) -> Vec<usize> {
    debug_assert!(
        amount <= pool.len(),
        "выборка {} элементов из пула {}",
        amount,
        pool.len()
    );
    let amount = amount.min(pool.len());
    index::sample(rng, pool.len(), amount)
        .into_iter()
        .map(|i| pool[i])
        .collect()
}
