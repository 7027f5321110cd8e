//! Batched inference against a remote factorization-machine endpoint.
//!
//! This crate sends the rows of a [`SparseDataset`](fmrec_data::SparseDataset)
//! to a [`Predictor`] in fixed-size batches, collects the predictions in row
//! order and scores them against ground truth.
//!
//! # Overview
//!
//! ```
//! use fmrec_data::prelude::*;
//! use fmrec_serving::prelude::*;
//!
//! let ratings = vec![Rating::new(0, 0, 5.0), Rating::new(1, 1, 3.0), Rating::new(2, 0, 4.0)];
//! let dataset = OneHotEncoder::fit(&ratings).unwrap().transform(&ratings).unwrap();
//!
//! let config = PipelineConfig::builder().batch_size(2).build();
//! let runner = BatchRunner::from_config(&config.inference).unwrap();
//!
//! let mut model = |batch: &PredictionBatch<'_>| {
//!     Ok::<_, BoxError>(vec![PredictionResult::new(4.0, 4.0); batch.len()])
//! };
//! let results = runner.run(&dataset, &mut model).unwrap();
//!
//! let predicted: Vec<f32> = results.iter().map(|r| r.predicted_label).collect();
//! let accuracy = compute_accuracy(&predicted, &dataset.labels()).unwrap();
//! assert!((accuracy - 1.0 / 3.0).abs() < 1e-12);
//! ```
//!
//! # Modules
//!
//! - [`predictor`] - The [`Predictor`] seam and a wire-format implementation
//! - [`runner`] - [`BatchRunner`] and [`run_batched`]
//! - [`metrics`] - [`compute_accuracy`] and [`EvaluationReport`]
//! - [`config`] - [`PipelineConfig`]
//! - [`error`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod predictor;
pub mod runner;

pub use config::{
    ConfigError, InferenceConfig, LabelConfig, PipelineConfig, PipelineConfigBuilder,
    RemainderPolicy, StorageConfig,
};
pub use error::{BoxError, InferenceResult, PredictionError, ValidationError};
pub use metrics::{compute_accuracy, EvaluationReport};
pub use predictor::{
    PredictionResult, Predictor, Transport, WireError, WirePredictor, DEFAULT_MAX_REQUEST_BYTES,
};
pub use runner::{run_batched, BatchRunner};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{PipelineConfig, RemainderPolicy};
    pub use crate::error::{BoxError, PredictionError, ValidationError};
    pub use crate::metrics::{compute_accuracy, EvaluationReport};
    pub use crate::predictor::{PredictionResult, Predictor};
    pub use crate::runner::{run_batched, BatchRunner};
}
