//! Sparse rows and datasets.
//!
//! A [`SparseRow`] is one training or prediction example: the positions of
//! its nonzero features, their values and a label. A [`SparseDataset`] is an
//! ordered, immutable collection of rows that all address the same feature
//! space.
//!
//! Rows never hold a dense buffer. A one-hot user/item row over a space of
//! several hundred thousand columns is two indices and two values.
//!
//! # Example
//!
//! ```
//! use fmrec_data::sparse::{SparseDataset, SparseRow};
//!
//! let rows = vec![
//!     SparseRow::one_hot(10, vec![1, 7], 4.0).unwrap(),
//!     SparseRow::one_hot(10, vec![2, 8], 3.0).unwrap(),
//! ];
//! let dataset = SparseDataset::new(10, rows).unwrap();
//! assert_eq!(dataset.len(), 2);
//! assert_eq!(dataset.nnz(), 4);
//! ```

use std::collections::HashSet;
use std::ops::Range;
use thiserror::Error;

use crate::batch::SparseBatches;

/// A structural problem with a single row.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    /// The index and value lists have different lengths.
    #[error("{indices} indices but {values} values")]
    LengthMismatch {
        /// Number of indices.
        indices: usize,
        /// Number of values.
        values: usize,
    },

    /// An index addresses a column outside the feature space.
    #[error("index {index} is out of bounds for feature count {feature_count}")]
    IndexOutOfBounds {
        /// The offending index.
        index: u32,
        /// The row's feature count.
        feature_count: u32,
    },

    /// The same column appears twice.
    #[error("duplicate feature index {index}")]
    DuplicateIndex {
        /// The repeated index.
        index: u32,
    },
}

/// Errors raised while assembling a dataset.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    /// A row failed validation.
    #[error("row {row}: {source}")]
    InvalidRow {
        /// Position of the row in the dataset.
        row: usize,
        /// What was wrong with it.
        source: RowError,
    },

    /// A row addresses a different feature space than the dataset.
    #[error("row {row}: feature count {actual} does not match dataset feature count {expected}")]
    FeatureCountMismatch {
        /// Position of the row in the dataset.
        row: usize,
        /// The dataset's feature count.
        expected: u32,
        /// The row's feature count.
        actual: u32,
    },

    /// A dataset cannot infer its feature count from zero rows.
    #[error("cannot infer the feature count of an empty dataset")]
    Empty,

    /// An identifier was not seen when the encoder was fitted.
    #[error("{kind} id {id} is outside the fitted range 0..{limit}")]
    UnknownId {
        /// `"user"` or `"item"`.
        kind: &'static str,
        /// The identifier.
        id: u32,
        /// Number of identifiers known for this kind.
        limit: u32,
    },

    /// The combined one-hot width does not fit the on-wire index type.
    #[error("feature space of {users} users and {items} items exceeds u32::MAX columns")]
    FeatureSpaceOverflow {
        /// Number of user columns.
        users: u32,
        /// Number of item columns.
        items: u32,
    },
}

/// Result type for dataset construction.
pub type Result<T> = std::result::Result<T, DataError>;

/// One example in sparse form.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseRow {
    /// Total addressable feature dimension.
    pub feature_count: u32,
    /// Columns holding a nonzero value, unique and `< feature_count`.
    pub indices: Vec<u32>,
    /// Values aligned 1:1 with `indices`.
    pub values: Vec<f32>,
    /// Rating or relevance label.
    pub label: f32,
}

impl SparseRow {
    /// Creates a validated row.
    ///
    /// # Errors
    ///
    /// Returns a [`RowError`] if the lists differ in length, an index is out of
    /// bounds or an index repeats.
    pub fn new(
        feature_count: u32,
        indices: Vec<u32>,
        values: Vec<f32>,
        label: f32,
    ) -> std::result::Result<Self, RowError> {
        let row = Self {
            feature_count,
            indices,
            values,
            label,
        };
        row.validate()?;
        Ok(row)
    }

    /// Creates a row whose nonzero values are all `1.0`.
    pub fn one_hot(
        feature_count: u32,
        indices: Vec<u32>,
        label: f32,
    ) -> std::result::Result<Self, RowError> {
        let values = vec![1.0; indices.len()];
        Self::new(feature_count, indices, values, label)
    }

    /// Checks the row invariants.
    pub fn validate(&self) -> std::result::Result<(), RowError> {
        if self.indices.len() != self.values.len() {
            return Err(RowError::LengthMismatch {
                indices: self.indices.len(),
                values: self.values.len(),
            });
        }

        // One-hot rows hold a handful of indices; scan instead of hashing.
        if self.indices.len() <= 16 {
            for (pos, &index) in self.indices.iter().enumerate() {
                self.check_bounds(index)?;
                if self.indices[..pos].contains(&index) {
                    return Err(RowError::DuplicateIndex { index });
                }
            }
        } else {
            let mut seen = HashSet::with_capacity(self.indices.len());
            for &index in &self.indices {
                self.check_bounds(index)?;
                if !seen.insert(index) {
                    return Err(RowError::DuplicateIndex { index });
                }
            }
        }
        Ok(())
    }

    fn check_bounds(&self, index: u32) -> std::result::Result<(), RowError> {
        if index >= self.feature_count {
            return Err(RowError::IndexOutOfBounds {
                index,
                feature_count: self.feature_count,
            });
        }
        Ok(())
    }

    /// Number of nonzero entries.
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Value stored at `index`, or `0.0` when the column is empty.
    pub fn get(&self, index: u32) -> f32 {
        self.indices
            .iter()
            .position(|&i| i == index)
            .map(|pos| self.values[pos])
            .unwrap_or(0.0)
    }

    /// Iterates over `(index, value)` pairs in stored order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }
}

/// An ordered, immutable collection of rows sharing one feature space.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseDataset {
    feature_count: u32,
    rows: Vec<SparseRow>,
}

impl SparseDataset {
    /// Creates a dataset, validating every row.
    ///
    /// An empty dataset is allowed here; the encoder rejects it.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::FeatureCountMismatch`] or [`DataError::InvalidRow`]
    /// for the first offending row.
    pub fn new(feature_count: u32, rows: Vec<SparseRow>) -> Result<Self> {
        for (row, r) in rows.iter().enumerate() {
            if r.feature_count != feature_count {
                return Err(DataError::FeatureCountMismatch {
                    row,
                    expected: feature_count,
                    actual: r.feature_count,
                });
            }
            r.validate()
                .map_err(|source| DataError::InvalidRow { row, source })?;
        }
        Ok(Self {
            feature_count,
            rows,
        })
    }

    /// Wraps rows that were already validated against `feature_count`.
    pub(crate) fn from_validated(feature_count: u32, rows: Vec<SparseRow>) -> Self {
        Self {
            feature_count,
            rows,
        }
    }

    /// Creates a dataset taking the feature count from the first row.
    pub fn from_rows(rows: Vec<SparseRow>) -> Result<Self> {
        let feature_count = rows.first().ok_or(DataError::Empty)?.feature_count;
        Self::new(feature_count, rows)
    }

    /// The shared feature dimension.
    pub fn feature_count(&self) -> u32 {
        self.feature_count
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows in order.
    pub fn rows(&self) -> &[SparseRow] {
        &self.rows
    }

    /// The row at `index`, if any.
    pub fn row(&self, index: usize) -> Option<&SparseRow> {
        self.rows.get(index)
    }

    /// Borrowed view of a contiguous range of rows.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds, like slice indexing.
    pub fn slice(&self, range: Range<usize>) -> &[SparseRow] {
        &self.rows[range]
    }

    /// Labels in row order.
    pub fn labels(&self) -> Vec<f32> {
        self.rows.iter().map(|r| r.label).collect()
    }

    /// Total number of stored nonzeros.
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(SparseRow::nnz).sum()
    }

    /// Iterates over the rows.
    pub fn iter(&self) -> std::slice::Iter<'_, SparseRow> {
        self.rows.iter()
    }

    /// Splits the dataset into consecutive batches of `batch_size` rows.
    ///
    /// The final batch may be shorter; see
    /// [`SparseBatches::drop_remainder`].
    ///
    /// # Panics
    ///
    /// Panics if `batch_size` is zero.
    pub fn batches(&self, batch_size: usize) -> SparseBatches<'_> {
        SparseBatches::new(self, batch_size)
    }

    /// Consumes the dataset and returns its rows.
    pub fn into_rows(self) -> Vec<SparseRow> {
        self.rows
    }

    /// Returns a copy with every label passed through `f`.
    pub fn map_labels<F: FnMut(f32) -> f32>(&self, mut f: F) -> Self {
        let rows = self
            .rows
            .iter()
            .map(|r| SparseRow {
                label: f(r.label),
                ..r.clone()
            })
            .collect();
        Self {
            feature_count: self.feature_count,
            rows,
        }
    }
}

impl<'a> IntoIterator for &'a SparseDataset {
    type Item = &'a SparseRow;
    type IntoIter = std::slice::Iter<'a, SparseRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_new_valid() {
        let row = SparseRow::new(10, vec![1, 7], vec![1.0, 0.5], 4.0).unwrap();
        assert_eq!(row.nnz(), 2);
        assert_eq!(row.get(7), 0.5);
        assert_eq!(row.get(3), 0.0);
    }

    #[test]
    fn test_row_length_mismatch() {
        let err = SparseRow::new(10, vec![1, 7], vec![1.0], 4.0).unwrap_err();
        assert_eq!(
            err,
            RowError::LengthMismatch {
                indices: 2,
                values: 1
            }
        );
    }

    #[test]
    fn test_row_index_out_of_bounds() {
        let err = SparseRow::one_hot(10, vec![10], 1.0).unwrap_err();
        assert_eq!(
            err,
            RowError::IndexOutOfBounds {
                index: 10,
                feature_count: 10
            }
        );
    }

    #[test]
    fn test_row_duplicate_index() {
        let err = SparseRow::one_hot(10, vec![3, 4, 3], 1.0).unwrap_err();
        assert_eq!(err, RowError::DuplicateIndex { index: 3 });
    }

    #[test]
    fn test_row_duplicate_index_long_row() {
        let mut indices: Vec<u32> = (0..40).collect();
        indices.push(17);
        let err = SparseRow::one_hot(100, indices, 1.0).unwrap_err();
        assert_eq!(err, RowError::DuplicateIndex { index: 17 });
    }

    #[test]
    fn test_empty_row_is_valid() {
        let row = SparseRow::one_hot(10, vec![], 2.0).unwrap();
        assert_eq!(row.nnz(), 0);
    }

    #[test]
    fn test_dataset_feature_count_mismatch() {
        let rows = vec![
            SparseRow::one_hot(10, vec![1], 1.0).unwrap(),
            SparseRow::one_hot(12, vec![1], 1.0).unwrap(),
        ];
        let err = SparseDataset::new(10, rows).unwrap_err();
        assert_eq!(
            err,
            DataError::FeatureCountMismatch {
                row: 1,
                expected: 10,
                actual: 12
            }
        );
    }

    #[test]
    fn test_dataset_rejects_unvalidated_row() {
        let bad = SparseRow {
            feature_count: 5,
            indices: vec![1, 1],
            values: vec![1.0, 1.0],
            label: 0.0,
        };
        let err = SparseDataset::new(5, vec![bad]).unwrap_err();
        assert!(matches!(
            err,
            DataError::InvalidRow {
                row: 0,
                source: RowError::DuplicateIndex { index: 1 }
            }
        ));
    }

    #[test]
    fn test_from_rows_empty() {
        assert_eq!(SparseDataset::from_rows(vec![]).unwrap_err(), DataError::Empty);
    }

    #[test]
    fn test_dataset_accessors() {
        let rows = (0..4)
            .map(|i| SparseRow::one_hot(8, vec![i, i + 4], i as f32).unwrap())
            .collect();
        let dataset = SparseDataset::new(8, rows).unwrap();

        assert_eq!(dataset.feature_count(), 8);
        assert_eq!(dataset.labels(), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(dataset.nnz(), 8);
        assert_eq!(dataset.slice(1..3).len(), 2);
        assert_eq!(dataset.row(3).unwrap().indices, vec![3, 7]);
        assert!(dataset.row(4).is_none());
    }

    #[test]
    fn test_map_labels_keeps_features() {
        let dataset =
            SparseDataset::from_rows(vec![SparseRow::one_hot(4, vec![0, 2], 5.0).unwrap()])
                .unwrap();
        let doubled = dataset.map_labels(|l| l * 2.0);
        assert_eq!(doubled.labels(), vec![10.0]);
        assert_eq!(doubled.rows()[0].indices, dataset.rows()[0].indices);
    }
}
