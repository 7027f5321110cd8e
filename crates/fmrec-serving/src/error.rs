//! Error types for the fmrec-serving crate.

use std::ops::Range;
use thiserror::Error;

/// Boxed error returned by predictor implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for batched inference.
pub type InferenceResult<T> = Result<T, PredictionError>;

/// Errors raised while running batched inference.
///
/// A run stops at the first failing batch. The error names that batch and the
/// dataset rows it covered so a caller can resume from there.
#[derive(Debug, Error)]
pub enum PredictionError {
    /// Batches must hold at least one row.
    #[error("batch size must be positive")]
    InvalidBatchSize,

    /// The predictor call for a batch failed.
    #[error("prediction failed for batch {batch_index} (rows {rows:?}): {source}")]
    BatchFailed {
        /// Zero-based batch position.
        batch_index: usize,
        /// Dataset rows submitted in the batch.
        rows: Range<usize>,
        /// The predictor's error.
        source: BoxError,
    },

    /// The predictor returned a different number of results than rows sent.
    #[error("batch {batch_index} (rows {rows:?}) returned {actual} results, expected {expected}")]
    ResultCountMismatch {
        /// Zero-based batch position.
        batch_index: usize,
        /// Dataset rows submitted in the batch.
        rows: Range<usize>,
        /// Rows in the batch.
        expected: usize,
        /// Results received.
        actual: usize,
    },
}

impl PredictionError {
    /// Index of the batch that failed, if the failure is tied to one.
    pub fn batch_index(&self) -> Option<usize> {
        match self {
            Self::InvalidBatchSize => None,
            Self::BatchFailed { batch_index, .. }
            | Self::ResultCountMismatch { batch_index, .. } => Some(*batch_index),
        }
    }

    /// Dataset rows of the failing batch, if the failure is tied to one.
    pub fn rows(&self) -> Option<Range<usize>> {
        match self {
            Self::InvalidBatchSize => None,
            Self::BatchFailed { rows, .. } | Self::ResultCountMismatch { rows, .. } => {
                Some(rows.clone())
            }
        }
    }
}

/// Errors raised when comparing predictions with ground truth.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The two sequences differ in length.
    #[error("length mismatch: {predicted} predictions but {actual} labels")]
    LengthMismatch {
        /// Number of predictions.
        predicted: usize,
        /// Number of labels.
        actual: usize,
    },

    /// Nothing to compare.
    #[error("cannot compute a metric over zero labels")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_failed_display_and_context() {
        let err = PredictionError::BatchFailed {
            batch_index: 2,
            rows: 20..30,
            source: "endpoint unavailable".into(),
        };
        assert_eq!(
            err.to_string(),
            "prediction failed for batch 2 (rows 20..30): endpoint unavailable"
        );
        assert_eq!(err.batch_index(), Some(2));
        assert_eq!(err.rows(), Some(20..30));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_invalid_batch_size_has_no_context() {
        let err = PredictionError::InvalidBatchSize;
        assert_eq!(err.batch_index(), None);
        assert_eq!(err.rows(), None);
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::LengthMismatch {
            predicted: 3,
            actual: 2,
        };
        assert_eq!(err.to_string(), "length mismatch: 3 predictions but 2 labels");
    }
}
