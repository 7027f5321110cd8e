//! Fixed-size batches over a sparse dataset.
//!
//! [`SparseBatches`] walks a [`SparseDataset`] in consecutive, non-overlapping
//! chunks and yields [`PredictionBatch`] views that borrow the dataset's rows.
//! No row is copied until a batch is serialized for the wire with
//! [`PredictionBatch::to_stream`].
//!
//! # Example
//!
//! ```
//! use fmrec_data::sparse::{SparseDataset, SparseRow};
//!
//! let rows = (0..7).map(|i| SparseRow::one_hot(16, vec![i], 1.0).unwrap()).collect();
//! let dataset = SparseDataset::new(16, rows).unwrap();
//!
//! let sizes: Vec<_> = dataset.batches(3).map(|b| b.len()).collect();
//! assert_eq!(sizes, vec![3, 3, 1]);
//!
//! let sizes: Vec<_> = dataset.batches(3).drop_remainder(true).map(|b| b.len()).collect();
//! assert_eq!(sizes, vec![3, 3]);
//! ```

use std::ops::Range;

use crate::compression::CompressionType;
use crate::record::{EncodingError, RecordStream, RecordStreamBuilder};
use crate::sparse::{SparseDataset, SparseRow};

/// A contiguous slice of a dataset submitted to a predictor in one call.
#[derive(Debug, Clone, Copy)]
pub struct PredictionBatch<'a> {
    index: usize,
    offset: usize,
    feature_count: u32,
    rows: &'a [SparseRow],
}

impl<'a> PredictionBatch<'a> {
    /// Creates a batch view.
    ///
    /// `offset` is the dataset position of `rows[0]`.
    pub fn new(index: usize, offset: usize, feature_count: u32, rows: &'a [SparseRow]) -> Self {
        Self {
            index,
            offset,
            feature_count,
            rows,
        }
    }

    /// Zero-based position of this batch in the run.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Dataset position of the first row.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Dataset positions covered by this batch.
    pub fn row_range(&self) -> Range<usize> {
        self.offset..self.offset + self.rows.len()
    }

    /// Feature dimension shared by the rows.
    pub fn feature_count(&self) -> u32 {
        self.feature_count
    }

    /// The rows in dataset order.
    pub fn rows(&self) -> &'a [SparseRow] {
        self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the batch holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Labels in row order.
    pub fn labels(&self) -> Vec<f32> {
        self.rows.iter().map(|r| r.label).collect()
    }

    /// Serializes the batch with the record wire format.
    ///
    /// This is the request body a remote predictor receives.
    pub fn to_stream(&self, compression: CompressionType) -> Result<RecordStream, EncodingError> {
        let mut builder = RecordStreamBuilder::new(self.feature_count).with_compression(compression);
        for row in self.rows {
            builder.push(row)?;
        }
        builder.finish()
    }
}

/// Iterator over consecutive [`PredictionBatch`]es of a dataset.
#[derive(Debug, Clone)]
pub struct SparseBatches<'a> {
    dataset: &'a SparseDataset,
    batch_size: usize,
    next_index: usize,
    position: usize,
    drop_remainder: bool,
}

impl<'a> SparseBatches<'a> {
    /// Creates an iterator that yields every row, the last batch possibly short.
    ///
    /// # Panics
    ///
    /// Panics if `batch_size` is zero.
    pub fn new(dataset: &'a SparseDataset, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch size must be positive");
        Self {
            dataset,
            batch_size,
            next_index: 0,
            position: 0,
            drop_remainder: false,
        }
    }

    /// Sets whether a trailing batch shorter than `batch_size` is skipped.
    pub fn drop_remainder(mut self, drop: bool) -> Self {
        self.drop_remainder = drop;
        self
    }

    /// Starts iteration at batch `index`, skipping earlier batches.
    pub fn skip_to(mut self, index: usize) -> Self {
        self.next_index = index;
        self.position = index.saturating_mul(self.batch_size).min(self.dataset.len());
        self
    }

    /// Number of batches this iterator yields from its current position.
    pub fn remaining_batches(&self) -> usize {
        let rows = self.dataset.len() - self.position;
        if self.drop_remainder {
            rows / self.batch_size
        } else {
            rows.div_ceil(self.batch_size)
        }
    }
}

impl<'a> Iterator for SparseBatches<'a> {
    type Item = PredictionBatch<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.dataset.len();
        if self.position >= len {
            return None;
        }

        let end = (self.position + self.batch_size).min(len);
        if self.drop_remainder && end - self.position < self.batch_size {
            return None;
        }

        let batch = PredictionBatch::new(
            self.next_index,
            self.position,
            self.dataset.feature_count(),
            self.dataset.slice(self.position..end),
        );
        self.next_index += 1;
        self.position = end;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining_batches();
        (n, Some(n))
    }
}

impl ExactSizeIterator for SparseBatches<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::decode;

    fn make_dataset(count: u32) -> SparseDataset {
        let rows = (0..count)
            .map(|i| SparseRow::one_hot(64, vec![i % 32, 32 + i % 32], i as f32).unwrap())
            .collect();
        SparseDataset::new(64, rows).unwrap()
    }

    #[test]
    fn test_exact_batches() {
        let dataset = make_dataset(10);
        let batches: Vec<_> = dataset.batches(5).collect();

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].row_range(), 0..5);
        assert_eq!(batches[1].row_range(), 5..10);
        assert_eq!(batches[1].index(), 1);
    }

    #[test]
    fn test_incomplete_batch() {
        let dataset = make_dataset(7);
        let batches: Vec<_> = dataset.batches(3).collect();

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2].len(), 1);
        assert_eq!(batches[2].offset(), 6);
        assert_eq!(batches[2].labels(), vec![6.0]);
    }

    #[test]
    fn test_drop_remainder() {
        let dataset = make_dataset(7);
        let batches: Vec<_> = dataset.batches(3).drop_remainder(true).collect();

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].row_range(), 3..6);
    }

    #[test]
    fn test_batch_larger_than_dataset() {
        let dataset = make_dataset(2);
        let batches: Vec<_> = dataset.batches(5).collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);

        assert_eq!(dataset.batches(5).drop_remainder(true).count(), 0);
    }

    #[test]
    fn test_empty_dataset_yields_nothing() {
        let dataset = SparseDataset::new(4, vec![]).unwrap();
        assert_eq!(dataset.batches(3).count(), 0);
    }

    #[test]
    fn test_size_hint_matches_count() {
        let dataset = make_dataset(11);
        assert_eq!(dataset.batches(4).len(), 3);
        assert_eq!(dataset.batches(4).drop_remainder(true).len(), 2);
        assert_eq!(dataset.batches(4).skip_to(2).len(), 1);
    }

    #[test]
    fn test_skip_to_resumes_indices() {
        let dataset = make_dataset(10);
        let batches: Vec<_> = dataset.batches(3).skip_to(2).collect();

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].index(), 2);
        assert_eq!(batches[0].row_range(), 6..9);
        assert_eq!(batches[1].row_range(), 9..10);
    }

    #[test]
    #[should_panic(expected = "batch size must be positive")]
    fn test_zero_batch_size_panics() {
        let dataset = make_dataset(3);
        let _ = dataset.batches(0);
    }

    #[test]
    fn test_batch_to_stream() {
        let dataset = make_dataset(6);
        let batch = dataset.batches(4).nth(1).unwrap();

        let stream = batch.to_stream(CompressionType::None).unwrap();
        assert_eq!(stream.len(), 2);

        let decoded = decode(&stream).unwrap();
        assert_eq!(decoded.rows(), dataset.slice(4..6));
    }
}
