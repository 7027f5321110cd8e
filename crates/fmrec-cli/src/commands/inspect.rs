//! Inspect Command Implementation
//!
//! Decodes a record file and prints a JSON summary with the first few rows.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

use fmrec_data::record::{decode, RecordStream};
use fmrec_data::sparse::SparseRow;

use super::{resolve_compression, CompressionArg};

/// Decode a record file and print a summary
#[derive(Args, Debug, Clone)]
pub struct InspectCommand {
    /// Record file to read
    #[arg(long, short = 'i')]
    pub input: PathBuf,

    /// Payload compression; detected from the file name when omitted
    #[arg(long, value_enum)]
    pub compression: Option<CompressionArg>,

    /// Number of leading rows to include
    #[arg(long, default_value = "5")]
    pub rows: usize,
}

/// One decoded row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowSummary {
    /// Nonzero column indices.
    pub indices: Vec<u32>,
    /// Values at those columns.
    pub values: Vec<f32>,
    /// Target label.
    pub label: f32,
}

impl From<&SparseRow> for RowSummary {
    fn from(row: &SparseRow) -> Self {
        Self {
            indices: row.indices.clone(),
            values: row.values.clone(),
            label: row.label,
        }
    }
}

/// Summary of a record file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordSummary {
    /// Number of records.
    pub records: usize,
    /// Bytes on disk.
    pub bytes: usize,
    /// Payload codec.
    pub compression: String,
    /// Feature dimension.
    pub feature_count: u32,
    /// Total stored nonzeros.
    pub nnz: usize,
    /// Record count per distinct label, keyed by the label's text.
    pub label_counts: BTreeMap<String, usize>,
    /// Leading rows.
    pub head: Vec<RowSummary>,
}

impl InspectCommand {
    /// Execute the inspect command
    pub fn run(&self) -> Result<()> {
        let summary = self.execute()?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
        Ok(())
    }

    /// Decodes the file and builds its summary.
    pub fn execute(&self) -> Result<RecordSummary> {
        let compression = resolve_compression(self.compression, &self.input, Default::default());
        info!("Inspecting {:?} (compression: {})", self.input, compression);

        let bytes = std::fs::read(&self.input)
            .with_context(|| format!("Failed to read {:?}", self.input))?;
        let stream = RecordStream::from_bytes(bytes, compression)
            .with_context(|| format!("{:?} is not a valid record file", self.input))?;
        let dataset = decode(&stream).context("Failed to decode records")?;

        let mut label_counts = BTreeMap::new();
        for label in dataset.labels() {
            *label_counts.entry(label.to_string()).or_insert(0) += 1;
        }

        Ok(RecordSummary {
            records: stream.len(),
            bytes: stream.byte_len(),
            compression: compression.to_string(),
            feature_count: dataset.feature_count(),
            nnz: dataset.nnz(),
            label_counts,
            head: dataset.iter().take(self.rows).map(RowSummary::from).collect(),
        })
    }
}
