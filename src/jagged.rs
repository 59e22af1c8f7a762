//! # Jagged numeric arrays
//!
//! Instrument files routinely contain short rows, and grouped measurements
//! routinely contain traces of different lengths. [`JaggedArray`] stores a
//! sequence of independently-lengthed `f64` sequences and only exposes
//! length-checked accessors, so no caller has to assume a uniform inner
//! dimension.
//!
//! ## Overview
//! -----------------
//! * [`JaggedArray::push_at`] – append a value to one inner sequence, creating
//!   missing inner sequences on demand (used to build ragged columns),
//! * [`JaggedArray::get`] / [`JaggedArray::row`] – checked access,
//! * [`JaggedArray::lengths`] / [`JaggedArray::uniform_len`] – shape inspection,
//! * [`JaggedArray::shifted`] / [`JaggedArray::stacked`] – constant and
//!   cumulative offsets (waterfall plots of grouped traces).
use serde::Serialize;

use crate::specfit_errors::SpecFitError;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JaggedArray {
    rows: Vec<Vec<f64>>,
}

impl JaggedArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        JaggedArray { rows }
    }

    /// Number of inner sequences.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<f64>) {
        self.rows.push(row);
    }

    /// Append `value` to inner sequence `index`, creating empty sequences up to
    /// `index` if they do not exist yet. Other sequences are left untouched, so
    /// a short input row leaves the trailing sequences unextended.
    pub fn push_at(&mut self, index: usize, value: f64) {
        if self.rows.len() <= index {
            self.rows.resize_with(index + 1, Vec::new);
        }
        self.rows[index].push(value);
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Checked access to element `col` of inner sequence `row`.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.rows.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Inner sequence `index`, or [`SpecFitError::MissingColumn`].
    pub fn require_row(&self, index: usize) -> Result<&[f64], SpecFitError> {
        self.row(index).ok_or(SpecFitError::MissingColumn {
            index,
            available: self.rows.len(),
        })
    }

    pub fn lengths(&self) -> Vec<usize> {
        self.rows.iter().map(Vec::len).collect()
    }

    /// Common length of all inner sequences, `None` when they differ or the
    /// array is empty.
    pub fn uniform_len(&self) -> Option<usize> {
        let first = self.rows.first()?.len();
        self.rows
            .iter()
            .all(|r| r.len() == first)
            .then_some(first)
    }

    pub fn is_uniform(&self) -> bool {
        self.uniform_len().is_some()
    }

    /// Add the same offset to every element.
    pub fn shifted(&self, shift: f64) -> Self {
        JaggedArray {
            rows: self
                .rows
                .iter()
                .map(|r| r.iter().map(|v| v + shift).collect())
                .collect(),
        }
    }

    /// Offset inner sequence `i` by `i * step`.
    pub fn stacked(&self, step: f64) -> Self {
        JaggedArray {
            rows: self
                .rows
                .iter()
                .enumerate()
                .map(|(i, r)| {
                    let offset = step * i as f64;
                    r.iter().map(|v| v + offset).collect()
                })
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn into_rows(self) -> Vec<Vec<f64>> {
        self.rows
    }
}

impl FromIterator<Vec<f64>> for JaggedArray {
    fn from_iter<I: IntoIterator<Item = Vec<f64>>>(iter: I) -> Self {
        JaggedArray {
            rows: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod jagged_test {
    use super::*;

    #[test]
    fn test_push_at_creates_ragged_rows() {
        let mut arr = JaggedArray::new();
        arr.push_at(0, 1.0);
        arr.push_at(1, 2.0);
        arr.push_at(0, 3.0);
        arr.push_at(3, 4.0);

        assert_eq!(arr.lengths(), vec![2, 1, 0, 1]);
        assert_eq!(arr.get(0, 1), Some(3.0));
        assert_eq!(arr.get(1, 1), None);
        assert_eq!(arr.get(7, 0), None);
        assert!(!arr.is_uniform());
    }

    #[test]
    fn test_require_row_reports_available() {
        let arr = JaggedArray::from_rows(vec![vec![1.0]]);
        assert_eq!(
            arr.require_row(1),
            Err(SpecFitError::MissingColumn {
                index: 1,
                available: 1
            })
        );
    }

    #[test]
    fn test_stacked_offsets() {
        let arr = JaggedArray::from_rows(vec![vec![0.0, 1.0], vec![0.0]]);
        let stacked = arr.stacked(0.5);
        assert_eq!(stacked.row(0), Some(&[0.0, 1.0][..]));
        assert_eq!(stacked.row(1), Some(&[0.5][..]));
        assert_eq!(arr.shifted(1.0).row(1), Some(&[1.0][..]));
        assert_eq!(stacked.uniform_len(), None);
    }
}
