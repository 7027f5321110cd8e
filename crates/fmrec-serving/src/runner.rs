//! Sequential batched inference.
//!
//! [`BatchRunner`] splits a [`SparseDataset`] into consecutive batches, calls
//! a [`Predictor`] once per batch and concatenates the results in dataset
//! order. The first failing batch aborts the run; results gathered before it
//! are dropped and the error names the batch so the caller can resume with
//! [`BatchRunner::run_from`].

use std::ops::Range;
use std::time::Instant;

use fmrec_data::batch::{PredictionBatch, SparseBatches};
use fmrec_data::sparse::SparseDataset;

use crate::config::{InferenceConfig, RemainderPolicy};
use crate::error::{BoxError, InferenceResult, PredictionError};
use crate::predictor::{PredictionResult, Predictor};

/// Splits datasets into batches and drives a predictor over them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchRunner {
    batch_size: usize,
    remainder: RemainderPolicy,
}

impl BatchRunner {
    /// Creates a runner that includes a short final batch.
    pub fn new(batch_size: usize) -> InferenceResult<Self> {
        if batch_size == 0 {
            return Err(PredictionError::InvalidBatchSize);
        }
        Ok(Self {
            batch_size,
            remainder: RemainderPolicy::IncludeShortBatch,
        })
    }

    /// Creates a runner from inference settings.
    pub fn from_config(config: &InferenceConfig) -> InferenceResult<Self> {
        Ok(Self::new(config.batch_size)?.with_remainder(config.remainder))
    }

    /// Sets the final-batch policy.
    pub fn with_remainder(mut self, remainder: RemainderPolicy) -> Self {
        self.remainder = remainder;
        self
    }

    /// Rows per predictor call.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Final-batch policy.
    pub fn remainder(&self) -> RemainderPolicy {
        self.remainder
    }

    /// Row ranges that a run over `len` rows submits, in call order.
    pub fn plan(&self, len: usize) -> Vec<Range<usize>> {
        (0..len)
            .step_by(self.batch_size)
            .map(|start| start..(start + self.batch_size).min(len))
            .filter(|range| {
                self.remainder == RemainderPolicy::IncludeShortBatch
                    || range.len() == self.batch_size
            })
            .collect()
    }

    /// Batches of `dataset` under this runner's policy.
    pub fn batches<'a>(&self, dataset: &'a SparseDataset) -> SparseBatches<'a> {
        dataset
            .batches(self.batch_size)
            .drop_remainder(self.remainder == RemainderPolicy::Drop)
    }

    /// Scores every planned batch of `dataset`.
    pub fn run<P>(
        &self,
        dataset: &SparseDataset,
        predictor: &mut P,
    ) -> InferenceResult<Vec<PredictionResult>>
    where
        P: Predictor + ?Sized,
    {
        self.run_from(dataset, 0, predictor)
    }

    /// Scores the planned batches starting at `start_batch`.
    ///
    /// Results cover rows from `start_batch * batch_size` onward, so a run
    /// that failed at batch `n` can be finished with `run_from(dataset, n, ..)`
    /// and appended to the results of a successful run over the earlier
    /// batches.
    pub fn run_from<P>(
        &self,
        dataset: &SparseDataset,
        start_batch: usize,
        predictor: &mut P,
    ) -> InferenceResult<Vec<PredictionResult>>
    where
        P: Predictor + ?Sized,
    {
        let start = Instant::now();
        let batches = self.batches(dataset).skip_to(start_batch);
        let total_batches = batches.len();
        let mut results = Vec::with_capacity(dataset.len());

        for batch in batches {
            let scored = self.score(&batch, predictor)?;
            results.extend(scored);
        }

        tracing::info!(
            rows = results.len(),
            batches = total_batches,
            start_batch,
            batch_size = self.batch_size,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Batched inference complete"
        );
        Ok(results)
    }

    fn score<P>(
        &self,
        batch: &PredictionBatch<'_>,
        predictor: &mut P,
    ) -> InferenceResult<Vec<PredictionResult>>
    where
        P: Predictor + ?Sized,
    {
        let rows = batch.row_range();
        tracing::debug!(batch = batch.index(), rows = ?rows, "Submitting batch");

        let results = predictor.predict(batch).map_err(|source| {
            tracing::warn!(batch = batch.index(), rows = ?rows, error = %source, "Batch failed");
            PredictionError::BatchFailed {
                batch_index: batch.index(),
                rows: rows.clone(),
                source,
            }
        })?;

        if results.len() != batch.len() {
            return Err(PredictionError::ResultCountMismatch {
                batch_index: batch.index(),
                rows,
                expected: batch.len(),
                actual: results.len(),
            });
        }
        Ok(results)
    }
}

/// Scores `dataset` in batches of `batch_size`, keeping the short final batch.
///
/// # Example
///
/// ```
/// use fmrec_data::sparse::{SparseDataset, SparseRow};
/// use fmrec_serving::{run_batched, BoxError, PredictionResult};
///
/// let rows = (0..5).map(|i| SparseRow::one_hot(10, vec![i, 5 + i], 4.0).unwrap()).collect();
/// let dataset = SparseDataset::new(10, rows).unwrap();
///
/// let results = run_batched(&dataset, 2, |batch| {
///     Ok::<_, BoxError>(vec![PredictionResult::new(4.0, 3.9); batch.len()])
/// })
/// .unwrap();
/// assert_eq!(results.len(), 5);
/// ```
pub fn run_batched<F, E>(
    dataset: &SparseDataset,
    batch_size: usize,
    mut predict: F,
) -> InferenceResult<Vec<PredictionResult>>
where
    F: FnMut(&PredictionBatch<'_>) -> Result<Vec<PredictionResult>, E>,
    E: Into<BoxError>,
{
    BatchRunner::new(batch_size)?.run(dataset, &mut predict)
}
