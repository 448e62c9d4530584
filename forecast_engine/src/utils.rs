//! Utility functions for the forecast_engine crate

use crate::error::{ForecastError, Result};
use std::ops::Range;

/// Index at which a chronological split puts `train_ratio` of `len` rows in training
pub fn split_index(len: usize, train_ratio: f64) -> usize {
    ((len as f64) * train_ratio).floor() as usize
}

/// Split an ordered slice into training and test parts without shuffling
pub fn train_test_split<T>(data: &[T], train_ratio: f64) -> Result<(&[T], &[T])> {
    if !(train_ratio > 0.0 && train_ratio < 1.0) {
        return Err(ForecastError::InvalidParameter(format!(
            "Train ratio must lie in (0, 1), got {}",
            train_ratio
        )));
    }
    let at = split_index(data.len(), train_ratio);
    if at == 0 || at == data.len() {
        return Err(ForecastError::InsufficientHistory {
            required: 2,
            available: data.len(),
        });
    }
    Ok(data.split_at(at))
}

/// Contiguous, unshuffled k-fold validation ranges over `len` rows.
///
/// The first `len % k` folds hold one extra row.
pub fn kfold_ranges(len: usize, k: usize) -> Result<Vec<Range<usize>>> {
    if k < 2 || len < k {
        return Err(ForecastError::InvalidParameter(format!(
            "Cannot make {} folds from {} rows",
            k, len
        )));
    }
    let base = len / k;
    let extra = len % k;
    let mut start = 0;
    Ok((0..k)
        .map(|i| {
            let size = base + usize::from(i < extra);
            let range = start..start + size;
            start += size;
            range
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kfold_covers_every_row_once() {
        let folds = kfold_ranges(10, 3).unwrap();
        assert_eq!(folds, vec![0..4, 4..7, 7..10]);
    }
}
