//! Evaluate Command Implementation
//!
//! Replays predictions captured from an endpoint (one JSON
//! [`PredictionResult`] per line, in row order) through the batch runner and
//! scores them against the labels of a record file.

use anyhow::{Context, Result};
use clap::Args;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::info;

use fmrec_data::batch::PredictionBatch;
use fmrec_data::record::{decode, RecordStream};
use fmrec_data::transform::binarize_labels;
use fmrec_serving::config::RemainderPolicy;
use fmrec_serving::{BatchRunner, BoxError, EvaluationReport, PredictionResult, Predictor};

use super::{load_config, resolve_compression, CompressionArg};

/// Evaluate recorded predictions against a record file
///
/// # Example
///
/// ```bash
/// fmrec evaluate --records test.rec --predictions predictions.jsonl --batch-size 100
/// ```
#[derive(Args, Debug, Clone)]
pub struct EvaluateCommand {
    /// Record file holding the ground-truth rows
    #[arg(long, short = 'r')]
    pub records: PathBuf,

    /// JSON-lines file of predictions in row order
    #[arg(long, short = 'p')]
    pub predictions: PathBuf,

    /// Pipeline config file (JSON)
    #[arg(long, short = 'c', env = "FMREC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the rows per predictor call
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Skip the final batch when it is shorter than the batch size
    #[arg(long)]
    pub drop_remainder: bool,

    /// Payload compression of the record file
    #[arg(long, value_enum)]
    pub compression: Option<CompressionArg>,

    /// Binarize the record labels at this threshold before scoring
    #[arg(long)]
    pub binarize_threshold: Option<f32>,
}

impl EvaluateCommand {
    /// Execute the evaluate command
    pub fn run(&self) -> Result<()> {
        let report = self.execute()?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }

    /// Runs the replay and returns the report.
    pub fn execute(&self) -> Result<EvaluationReport> {
        let mut config = load_config(self.config.as_deref())?;
        if let Some(batch_size) = self.batch_size {
            config.inference.batch_size = batch_size;
        }
        if self.drop_remainder {
            config.inference.remainder = RemainderPolicy::Drop;
        }
        if let Some(threshold) = self.binarize_threshold {
            config.labels.binarize_threshold = Some(threshold);
        }
        config.validate().context("Invalid pipeline configuration")?;

        let compression = resolve_compression(self.compression, &self.records, config.compression);
        let bytes = std::fs::read(&self.records)
            .with_context(|| format!("Failed to read {:?}", self.records))?;
        let stream = RecordStream::from_bytes(bytes, compression)
            .with_context(|| format!("{:?} is not a valid record file", self.records))?;
        let mut dataset = decode(&stream).context("Failed to decode records")?;
        if let Some(threshold) = config.labels.binarize_threshold {
            dataset = binarize_labels(&dataset, threshold);
        }

        let mut predictor = ReplayPredictor::from_json_lines(&self.predictions)?;
        let runner = BatchRunner::from_config(&config.inference)?;
        info!(
            rows = dataset.len(),
            batch_size = runner.batch_size(),
            "Replaying {} predictions",
            predictor.remaining()
        );

        let results = runner.run(&dataset, &mut predictor)?;
        if predictor.remaining() > 0 {
            tracing::warn!(
                unused = predictor.remaining(),
                "Predictions file has more entries than scored rows"
            );
        }

        let labels = &dataset.labels()[..results.len()];
        let report = EvaluationReport::from_results(&results, labels)?;
        info!(
            accuracy = report.accuracy,
            mae = report.mean_absolute_error,
            "Evaluated {} rows",
            report.count
        );
        Ok(report)
    }
}

/// Serves previously captured predictions in order, one batch at a time.
#[derive(Debug, Clone)]
pub struct ReplayPredictor {
    results: Vec<PredictionResult>,
    cursor: usize,
}

impl ReplayPredictor {
    /// Wraps captured results.
    pub fn new(results: Vec<PredictionResult>) -> Self {
        Self { results, cursor: 0 }
    }

    /// Loads results from a JSON-lines file, skipping blank lines.
    pub fn from_json_lines(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open predictions file {path:?}"))?;

        let mut results = Vec::new();
        for (line_no, line) in std::io::BufReader::new(file).lines().enumerate() {
            let line = line.context("Failed to read predictions file")?;
            if line.trim().is_empty() {
                continue;
            }
            let result: PredictionResult = serde_json::from_str(&line)
                .with_context(|| format!("Invalid prediction on line {}", line_no + 1))?;
            results.push(result);
        }
        Ok(Self::new(results))
    }

    /// Results not yet served.
    pub fn remaining(&self) -> usize {
        self.results.len() - self.cursor
    }
}

impl Predictor for ReplayPredictor {
    fn predict(&mut self, batch: &PredictionBatch<'_>) -> Result<Vec<PredictionResult>, BoxError> {
        if self.remaining() < batch.len() {
            return Err(format!(
                "only {} recorded predictions left for {} rows",
                self.remaining(),
                batch.len()
            )
            .into());
        }
        let end = self.cursor + batch.len();
        let served = self.results[self.cursor..end].to_vec();
        self.cursor = end;
        Ok(served)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fmrec_data::sparse::{SparseDataset, SparseRow};

    #[test]
    fn test_replay_serves_in_order_then_runs_dry() {
        let rows = (0..3)
            .map(|i| SparseRow::one_hot(6, vec![i, 3 + i], 1.0).unwrap())
            .collect();
        let dataset = SparseDataset::new(6, rows).unwrap();
        let mut replay = ReplayPredictor::new(vec![
            PredictionResult::new(1.0, 0.9),
            PredictionResult::new(0.0, 0.2),
        ]);

        let mut batches = dataset.batches(2);
        let first = replay.predict(&batches.next().unwrap()).unwrap();
        assert_eq!(first[1].score, 0.2);
        assert_eq!(replay.remaining(), 0);

        let err = replay.predict(&batches.next().unwrap()).unwrap_err();
        assert!(err.to_string().contains("only 0 recorded predictions left for 1 rows"));
    }
}
