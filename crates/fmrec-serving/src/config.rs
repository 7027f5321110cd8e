//! Pipeline configuration.
//!
//! Everything the encode/evaluate workflow needs to know about its
//! surroundings (where streams are stored, how predictions are batched, how
//! labels are interpreted) lives in one [`PipelineConfig`] that is passed to
//! whichever component needs it. Neither the codec nor the runner reads any
//! global state.
//!
//! # Example
//!
//! ```
//! use fmrec_serving::config::{PipelineConfig, RemainderPolicy};
//!
//! let config = PipelineConfig::builder()
//!     .bucket("ratings-bucket")
//!     .prefix("fm/movielens")
//!     .batch_size(100)
//!     .binarize_threshold(4.0)
//!     .build();
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.inference.remainder, RemainderPolicy::IncludeShortBatch);
//! ```

use fmrec_data::compression::CompressionType;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::predictor::DEFAULT_MAX_REQUEST_BYTES;

/// Configuration validation and loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Batch size must be positive.
    #[error("batch_size must be positive")]
    InvalidBatchSize,

    /// Request limit must be positive.
    #[error("max_request_bytes must be positive")]
    InvalidRequestLimit,

    /// Bucket name must not be empty.
    #[error("storage bucket must not be empty")]
    EmptyBucket,

    /// The binarization threshold is NaN or infinite.
    #[error("binarize_threshold must be finite, got {0}")]
    InvalidThreshold(f32),

    /// The config file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid JSON for this schema.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// What to do with trailing rows that do not fill a whole batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainderPolicy {
    /// Send the leftover rows as a final, shorter batch.
    #[default]
    IncludeShortBatch,
    /// Never score the leftover rows.
    Drop,
}

/// Object storage location for encoded streams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Bucket name.
    pub bucket: String,
    /// Key prefix under the bucket, `/`-separated.
    pub prefix: String,
    /// Region the bucket lives in, if the backend needs one.
    pub region: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: "fmrec".to_string(),
            prefix: "factorization-machines".to_string(),
            region: None,
        }
    }
}

impl StorageConfig {
    /// Full object key for `name` under the configured prefix.
    pub fn object_key(&self, name: &str) -> String {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}/{name}")
        }
    }
}

/// Batched inference settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Rows per predictor call.
    pub batch_size: usize,
    /// Handling of the final partial batch.
    pub remainder: RemainderPolicy,
    /// Largest serialized request a predictor may send.
    pub max_request_bytes: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            remainder: RemainderPolicy::default(),
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

/// Label interpretation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Ratings at or above this value become `1.0`, others `0.0`.
    /// `None` keeps the raw ratings.
    pub binarize_threshold: Option<f32>,
}

/// Top-level configuration for the encode/evaluate workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Where streams are stored.
    pub storage: StorageConfig,
    /// How predictions are batched.
    pub inference: InferenceConfig,
    /// How labels are interpreted.
    pub labels: LabelConfig,
    /// Payload codec for encoded streams.
    pub compression: CompressionType,
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Loads a configuration from a JSON file.
    ///
    /// Missing fields take their defaults. The result is validated.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        tracing::debug!(path = %path.as_ref().display(), "Loaded pipeline config");
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inference.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        if self.inference.max_request_bytes == 0 {
            return Err(ConfigError::InvalidRequestLimit);
        }
        if self.storage.bucket.trim().is_empty() {
            return Err(ConfigError::EmptyBucket);
        }
        if let Some(threshold) = self.labels.binarize_threshold {
            if !threshold.is_finite() {
                return Err(ConfigError::InvalidThreshold(threshold));
            }
        }
        Ok(())
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set the storage bucket.
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.storage.bucket = bucket.into();
        self
    }

    /// Set the key prefix.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.storage.prefix = prefix.into();
        self
    }

    /// Set the storage region.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.storage.region = Some(region.into());
        self
    }

    /// Set the rows per predictor call.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.inference.batch_size = batch_size;
        self
    }

    /// Set the final-batch policy.
    pub fn remainder(mut self, remainder: RemainderPolicy) -> Self {
        self.config.inference.remainder = remainder;
        self
    }

    /// Set the request size limit.
    pub fn max_request_bytes(mut self, limit: usize) -> Self {
        self.config.inference.max_request_bytes = limit;
        self
    }

    /// Set the label binarization threshold.
    pub fn binarize_threshold(mut self, threshold: f32) -> Self {
        self.config.labels.binarize_threshold = Some(threshold);
        self
    }

    /// Set the payload codec.
    pub fn compression(mut self, compression: CompressionType) -> Self {
        self.config.compression = compression;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> PipelineConfig {
        self.config
    }
}
