//! fmrec CLI Library
//!
//! Command-line tools around the fmrec record format:
//!
//! - **Encode**: Turn a ratings file into a one-hot record file
//! - **Inspect**: Decode a record file and summarize it
//! - **Evaluate**: Replay recorded predictions through the batch runner and
//!   score them
//!
//! # Example
//!
//! ```bash
//! # Encode MovieLens u1.base (tab separated, no header) with binary labels
//! fmrec encode --input ml-100k/u1.base --delimiter '\t' --no-header \
//!     --output-dir ./out --key train/train.rec --binarize-threshold 4
//!
//! # Look at the first rows
//! fmrec inspect --input ./out/fmrec/factorization-machines/train/train.rec --rows 3
//!
//! # Score predictions returned by the endpoint
//! fmrec evaluate --records test.rec --predictions predictions.jsonl --batch-size 100
//! ```

pub mod commands;

use clap::{Parser, Subcommand};

pub use commands::{CompressionArg, EncodeCommand, EvaluateCommand, InspectCommand};

/// fmrec - Sparse rating records for factorization-machine workflows
#[derive(Parser, Debug)]
#[command(name = "fmrec")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Encode a ratings file into a record file
    Encode(EncodeCommand),

    /// Decode a record file and print a summary
    Inspect(InspectCommand),

    /// Evaluate recorded predictions against a record file
    Evaluate(EvaluateCommand),
}

/// Result type alias for CLI operations
pub type CliResult<T> = anyhow::Result<T>;
