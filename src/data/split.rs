//! Chronological train/test splitting

use crate::{FormError, Result};

/// Positional split of date-ordered rows
#[derive(Debug, Clone, Copy)]
pub struct DatasetSplitter {
    train_fraction: f64,
}

impl DatasetSplitter {
    /// Splitter keeping the first `train_fraction` of rows for training
    ///
    /// The fraction must lie strictly between 0 and 1.
    pub fn new(train_fraction: f64) -> Result<Self> {
        if !(train_fraction > 0.0 && train_fraction < 1.0) {
            return Err(FormError::Config(format!(
                "train_fraction must be in (0, 1), got {}",
                train_fraction
            )));
        }
        Ok(DatasetSplitter { train_fraction })
    }

    pub fn train_fraction(&self) -> f64 {
        self.train_fraction
    }

    /// Index of the first test row: floor(len * train_fraction)
    pub fn cut_index(&self, len: usize) -> usize {
        (len as f64 * self.train_fraction).floor() as usize
    }

    /// Split rows without shuffling; either side may be empty
    pub fn split<T: Clone>(&self, rows: &[T]) -> (Vec<T>, Vec<T>) {
        let (train, test) = rows.split_at(self.cut_index(rows.len()));
        (train.to_vec(), test.to_vec())
    }

    /// Split rows, failing if either side is empty
    pub fn split_checked<T: Clone>(&self, rows: &[T]) -> Result<(Vec<T>, Vec<T>)> {
        let (train, test) = self.split(rows);
        if train.is_empty() || test.is_empty() {
            return Err(FormError::DegenerateSplit {
                train: train.len(),
                test: test.len(),
            });
        }
        Ok((train, test))
    }
}

/// Expanding-window folds for time-series cross-validation
///
/// Rows are divided into `n_splits + 1` consecutive blocks; fold `k` trains
/// on blocks `0..=k` and tests on block `k + 1`. Returns (train, test) index
/// ranges. The first block absorbs any remainder.
pub fn expanding_folds(
    len: usize,
    n_splits: usize,
) -> Result<Vec<(std::ops::Range<usize>, std::ops::Range<usize>)>> {
    if n_splits == 0 {
        return Err(FormError::Config("cv_folds must be positive".to_string()));
    }
    let test_size = len / (n_splits + 1);
    if test_size == 0 {
        return Err(FormError::DegenerateSplit {
            train: len,
            test: 0,
        });
    }

    let first_test = len - n_splits * test_size;
    Ok((0..n_splits)
        .map(|k| {
            let start = first_test + k * test_size;
            (0..start, start..start + test_size)
        })
        .collect())
}
