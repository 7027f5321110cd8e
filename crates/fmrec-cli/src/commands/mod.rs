//! CLI Command Implementations
//!
//! - [`encode`]: Ratings file to record file
//! - [`inspect`]: Record file summary
//! - [`evaluate`]: Prediction replay and scoring

mod encode;
mod evaluate;
mod inspect;

use std::path::Path;

use anyhow::{Context, Result};
use fmrec_data::compression::CompressionType;
use fmrec_serving::config::PipelineConfig;

pub use encode::EncodeCommand;
pub use evaluate::{EvaluateCommand, ReplayPredictor};
pub use inspect::{InspectCommand, RecordSummary, RowSummary};

/// Payload compression selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CompressionArg {
    /// No compression
    None,
    /// Gzip
    Gzip,
    /// Zlib
    Zlib,
    /// Snappy
    Snappy,
}

impl From<CompressionArg> for CompressionType {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::None => CompressionType::None,
            CompressionArg::Gzip => CompressionType::Gzip,
            CompressionArg::Zlib => CompressionType::Zlib,
            CompressionArg::Snappy => CompressionType::Snappy,
        }
    }
}

/// Loads the pipeline config from `path`, or the defaults.
pub(crate) fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

/// Compression from the flag, else from the file extension, else the config.
pub(crate) fn resolve_compression(
    flag: Option<CompressionArg>,
    path: &Path,
    fallback: CompressionType,
) -> CompressionType {
    if let Some(arg) = flag {
        return arg.into();
    }
    match CompressionType::from_extension(&path.to_string_lossy()) {
        CompressionType::None => fallback,
        detected => detected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_resolve_compression() {
        let plain = PathBuf::from("train.rec");
        let gz = PathBuf::from("train.rec.gz");

        assert_eq!(
            resolve_compression(None, &plain, CompressionType::None),
            CompressionType::None
        );
        assert_eq!(
            resolve_compression(None, &gz, CompressionType::None),
            CompressionType::Gzip
        );
        assert_eq!(
            resolve_compression(Some(CompressionArg::Snappy), &gz, CompressionType::None),
            CompressionType::Snappy
        );
    }

    #[test]
    fn test_load_config_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }
}
