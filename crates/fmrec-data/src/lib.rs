//! Sparse rating data and its record codec for fmrec.
//!
//! This crate holds everything on the data side of a factorization-machine
//! workflow: the typed sparse model of one-hot encoded ratings, the binary
//! record stream those rows are uploaded as, and the batch views used when the
//! same rows are sent to a remote predictor.
//!
//! # Overview
//!
//! ```
//! use fmrec_data::prelude::*;
//!
//! let ratings = vec![Rating::new(0, 1, 4.0), Rating::new(1, 0, 2.0), Rating::new(2, 2, 5.0)];
//! let dataset = OneHotEncoder::fit(&ratings).unwrap().transform(&ratings).unwrap();
//!
//! let stream = encode(&dataset).unwrap();
//! assert_eq!(decode(&stream).unwrap(), dataset);
//!
//! let mut sink = MemorySink::new();
//! let uri = sink.put("train/ratings.rec", &stream).unwrap();
//! assert_eq!(uri, "mem://train/ratings.rec");
//!
//! for batch in dataset.batches(2) {
//!     assert!(batch.len() <= 2);
//! }
//! ```
//!
//! # Modules
//!
//! - [`sparse`] - [`SparseRow`] and [`SparseDataset`]
//! - [`record`] - The length-prefixed record codec and [`RecordStream`]
//! - [`compression`] - Per-record payload compression
//! - [`batch`] - [`PredictionBatch`] views over a dataset
//! - [`transform`] - One-hot encoding and label binarization
//! - [`sink`] - Persistence collaborators for record streams
//!
//! # Features
//!
//! - `gzip` - Gzip/Zlib payload compression
//! - `snappy` - Snappy payload compression
//! - `compression` - Both of the above (default)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod compression;
pub mod record;
pub mod sink;
pub mod sparse;
pub mod transform;

pub use batch::{PredictionBatch, SparseBatches};
pub use compression::{compress, decompress, decompress_bounded, CompressionError, CompressionType};
pub use record::{
    decode, decode_bytes, decode_row, encode, encode_row, encode_rows, encode_with, encoded_len,
    DecodingError, EncodingError, RecordReader, RecordStream, RecordStreamBuilder, RecordWriter,
    MAX_RECORD_BYTES,
};
pub use sink::{LocalDirSink, MemorySink, RecordSink, SinkError};
pub use sparse::{DataError, RowError, SparseDataset, SparseRow};
pub use transform::{binarize_labels, OneHotEncoder, Rating};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::batch::PredictionBatch;
    pub use crate::compression::CompressionType;
    pub use crate::record::{decode, encode, RecordStream, RecordStreamBuilder};
    pub use crate::sink::{MemorySink, RecordSink};
    pub use crate::sparse::{SparseDataset, SparseRow};
    pub use crate::transform::{binarize_labels, OneHotEncoder, Rating};
}
