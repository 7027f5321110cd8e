//! The seam between the batch runner and the remote model.
//!
//! The factorization machine itself lives behind an endpoint this crate knows
//! nothing about. The runner only needs something implementing [`Predictor`]:
//! given a [`PredictionBatch`], return one [`PredictionResult`] per row in the
//! same order. Closures implement it directly, which keeps stub predictors in
//! tests to a few lines.
//!
//! [`WirePredictor`] is the production shape: it serializes each batch with
//! the record codec, enforces a request size limit and hands the bytes to a
//! [`Transport`].

use fmrec_data::batch::PredictionBatch;
use fmrec_data::compression::CompressionType;
use fmrec_data::record::{EncodingError, RecordStream};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::BoxError;

/// Prediction for one row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Class or rounded rating chosen by the model.
    pub predicted_label: f32,
    /// Raw regression output or confidence.
    pub score: f32,
}

impl PredictionResult {
    /// Creates a result.
    pub fn new(predicted_label: f32, score: f32) -> Self {
        Self {
            predicted_label,
            score,
        }
    }
}

/// Something that scores a batch of sparse rows.
///
/// Calls are blocking and made one batch at a time. Timeouts and retries, if
/// any, belong to the implementation.
pub trait Predictor {
    /// Returns one result per row of `batch`, in row order.
    fn predict(&mut self, batch: &PredictionBatch<'_>) -> Result<Vec<PredictionResult>, BoxError>;
}

impl<F, E> Predictor for F
where
    F: FnMut(&PredictionBatch<'_>) -> Result<Vec<PredictionResult>, E>,
    E: Into<BoxError>,
{
    fn predict(&mut self, batch: &PredictionBatch<'_>) -> Result<Vec<PredictionResult>, BoxError> {
        (*self)(batch).map_err(Into::into)
    }
}

/// Carries a serialized batch to the remote endpoint.
pub trait Transport {
    /// Sends one request body and returns the parsed results.
    fn send(&mut self, request: &RecordStream) -> Result<Vec<PredictionResult>, BoxError>;
}

/// Errors raised while preparing a request.
#[derive(Debug, Error)]
pub enum WireError {
    /// The batch could not be serialized.
    #[error("failed to encode batch: {0}")]
    Encoding(#[from] EncodingError),

    /// The serialized batch exceeds the endpoint's request limit.
    #[error("request of {size} bytes exceeds the {limit} byte limit")]
    RequestTooLarge {
        /// Serialized size.
        size: usize,
        /// Configured limit.
        limit: usize,
    },
}

/// Default request limit, matching common managed endpoints.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 5 * 1024 * 1024;

/// Predictor that speaks the record wire format over a [`Transport`].
#[derive(Debug)]
pub struct WirePredictor<T> {
    transport: T,
    compression: CompressionType,
    max_request_bytes: usize,
}

impl<T: Transport> WirePredictor<T> {
    /// Wraps a transport with uncompressed requests and the default limit.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            compression: CompressionType::None,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }

    /// Sets the payload codec used for requests.
    pub fn with_compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the largest request body that will be sent.
    pub fn with_max_request_bytes(mut self, limit: usize) -> Self {
        self.max_request_bytes = limit;
        self
    }

    /// The wrapped transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Serializes a batch, checking the size limit.
    pub fn encode_request(&self, batch: &PredictionBatch<'_>) -> Result<RecordStream, WireError> {
        let request = batch.to_stream(self.compression)?;
        if request.byte_len() > self.max_request_bytes {
            return Err(WireError::RequestTooLarge {
                size: request.byte_len(),
                limit: self.max_request_bytes,
            });
        }
        Ok(request)
    }
}

impl<T: Transport> Predictor for WirePredictor<T> {
    fn predict(&mut self, batch: &PredictionBatch<'_>) -> Result<Vec<PredictionResult>, BoxError> {
        let request = self.encode_request(batch)?;
        tracing::trace!(
            batch = batch.index(),
            bytes = request.byte_len(),
            "Sending prediction request"
        );
        self.transport.send(&request)
    }
}
