//! Encode Command Implementation
//!
//! Reads `(user_id, item_id, rating)` triples from a delimited text file,
//! one-hot encodes them and stores the record stream under a local directory
//! laid out like an object store (`<output-dir>/<bucket>/<prefix>/<key>`).

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use tracing::info;

use fmrec_data::record::encode_with;
use fmrec_data::sink::{LocalDirSink, RecordSink};
use fmrec_data::transform::{binarize_labels, OneHotEncoder, Rating};
use fmrec_serving::config::PipelineConfig;

use super::{load_config, CompressionArg};

/// Encode a ratings file into a record file
///
/// # Example
///
/// ```bash
/// fmrec encode \
///     --input ml-100k/u1.test --delimiter '\t' --no-header \
///     --num-users 943 --num-items 1682 \
///     --output-dir ./out --key test/test.rec
/// ```
#[derive(Args, Debug, Clone)]
pub struct EncodeCommand {
    /// Ratings file with user id, item id and rating in the first three columns
    #[arg(long, short = 'i')]
    pub input: PathBuf,

    /// Root directory standing in for the object store
    #[arg(long, short = 'o', env = "FMREC_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Object key under the configured prefix
    #[arg(long, default_value = "train/train.rec")]
    pub key: String,

    /// Pipeline config file (JSON)
    #[arg(long, short = 'c', env = "FMREC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the storage bucket
    #[arg(long)]
    pub bucket: Option<String>,

    /// Override the key prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// Override the payload compression
    #[arg(long, value_enum)]
    pub compression: Option<CompressionArg>,

    /// Map ratings at or above this value to 1 and the rest to 0
    #[arg(long)]
    pub binarize_threshold: Option<f32>,

    /// Column delimiter, a single character or `\t`
    #[arg(long, default_value = ",")]
    pub delimiter: String,

    /// The input has no header row
    #[arg(long)]
    pub no_header: bool,

    /// Number of users; inferred from the largest id when omitted
    #[arg(long, requires = "num_items")]
    pub num_users: Option<u32>,

    /// Number of items; inferred from the largest id when omitted
    #[arg(long, requires = "num_users")]
    pub num_items: Option<u32>,
}

impl EncodeCommand {
    /// Execute the encode command
    pub fn run(&self) -> Result<()> {
        let uri = self.execute()?;
        println!("{uri}");
        Ok(())
    }

    /// Encodes and stores the stream, returning its location.
    pub fn execute(&self) -> Result<String> {
        let config = self.resolve_config()?;
        info!("Reading ratings from {:?}", self.input);

        let ratings = read_ratings(&self.input, parse_delimiter(&self.delimiter)?, !self.no_header)?;
        if ratings.is_empty() {
            anyhow::bail!("No ratings found in {:?}", self.input);
        }

        let encoder = match (self.num_users, self.num_items) {
            (Some(users), Some(items)) => OneHotEncoder::new(users, items)?,
            _ => OneHotEncoder::fit(&ratings)?,
        };
        info!(
            users = encoder.num_users(),
            items = encoder.num_items(),
            feature_count = encoder.feature_count(),
            "One-hot encoding {} ratings",
            ratings.len()
        );

        let mut dataset = encoder
            .transform(&ratings)
            .context("Failed to one-hot encode ratings")?;
        if let Some(threshold) = config.labels.binarize_threshold {
            dataset = binarize_labels(&dataset, threshold);
        }

        let stream = encode_with(&dataset, config.compression).context("Failed to encode records")?;
        let mut sink = LocalDirSink::new(&self.output_dir, &config.storage.bucket, &config.storage.prefix);
        let uri = sink
            .put(&self.key, &stream)
            .with_context(|| format!("Failed to store records under key {:?}", self.key))?;

        info!(
            records = stream.len(),
            bytes = stream.byte_len(),
            compression = %config.compression,
            "Stored {}",
            uri
        );
        Ok(uri)
    }

    fn resolve_config(&self) -> Result<PipelineConfig> {
        let mut config = load_config(self.config.as_deref())?;
        if let Some(bucket) = &self.bucket {
            config.storage.bucket = bucket.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.storage.prefix = prefix.clone();
        }
        if let Some(compression) = self.compression {
            config.compression = compression.into();
        }
        if let Some(threshold) = self.binarize_threshold {
            config.labels.binarize_threshold = Some(threshold);
        }
        config.validate().context("Invalid pipeline configuration")?;
        Ok(config)
    }
}

fn parse_delimiter(raw: &str) -> Result<u8> {
    match raw {
        "\\t" | "tab" => Ok(b'\t'),
        _ if raw.len() == 1 => Ok(raw.as_bytes()[0]),
        _ => anyhow::bail!("Delimiter must be a single byte, got {raw:?}"),
    }
}

/// Reads the first three columns of every record as a [`Rating`].
pub(crate) fn read_ratings(path: &Path, delimiter: u8, has_headers: bool) -> Result<Vec<Rating>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_headers)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open ratings file {path:?}"))?;

    let mut ratings = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result.context("Failed to read ratings record")?;
        let line = record
            .position()
            .map_or(index as u64 + 1 + u64::from(has_headers), |pos| pos.line());
        let field = |i: usize, name: &str| {
            record
                .get(i)
                .with_context(|| format!("Line {line}: missing {name} column"))
        };

        let user_id: u32 = field(0, "user_id")?
            .parse()
            .with_context(|| format!("Line {line}: invalid user_id"))?;
        let item_id: u32 = field(1, "item_id")?
            .parse()
            .with_context(|| format!("Line {line}: invalid item_id"))?;
        let rating: f32 = field(2, "rating")?
            .parse()
            .with_context(|| format!("Line {line}: invalid rating"))?;
        ratings.push(Rating::new(user_id, item_id, rating));
    }
    Ok(ratings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter(",").unwrap(), b',');
        assert_eq!(parse_delimiter("\\t").unwrap(), b'\t');
        assert_eq!(parse_delimiter("tab").unwrap(), b'\t');
        assert!(parse_delimiter(";;").is_err());
    }

    #[test]
    fn test_read_ratings_tab_separated() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("u.data");
        std::fs::write(&path, "196\t242\t3\t881250949\n186\t302\t3\t891717742\n").unwrap();

        let ratings = read_ratings(&path, b'\t', false).unwrap();
        assert_eq!(ratings, vec![Rating::new(196, 242, 3.0), Rating::new(186, 302, 3.0)]);
    }

    #[test]
    fn test_read_ratings_reports_bad_field() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("ratings.csv");
        std::fs::write(&path, "user_id,item_id,rating\n1,2,x\n").unwrap();

        let err = read_ratings(&path, b',', true).unwrap_err();
        assert_eq!(err.to_string(), "Line 2: invalid rating");
    }

    #[test]
    fn test_read_ratings_reports_file_line() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("u.data");
        std::fs::write(&path, "1\t2\t3\n4\t5\t4\n6\tseven\t1\n").unwrap();

        let err = read_ratings(&path, b'\t', false).unwrap_err();
        assert_eq!(err.to_string(), "Line 3: invalid item_id");
    }
}
