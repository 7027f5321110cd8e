//! Length-prefixed sparse record codec.
//!
//! This module turns a [`SparseDataset`] into a [`RecordStream`], one
//! self-contained record per row, and back. The stream is what gets uploaded
//! for training and what a remote predictor receives for a batch.
//!
//! # Record Format
//!
//! Every record is framed the way TFRecord frames its entries. All integers
//! are little-endian:
//! - `u64` payload length `L`
//! - `u32` masked CRC32 of the 8 length bytes
//! - `byte[L]` payload
//! - `u32` masked CRC32 of the payload
//!
//! The mask is `crc.rotate_right(15).wrapping_add(0xa282ead8)` over the IEEE
//! CRC32. The uncompressed payload of a row with `k` nonzeros is
//! `12 + 8k` bytes:
//! - `u32` feature count
//! - `u32` nonzero count `k`
//! - `k` x `u32` indices
//! - `k` x `f32` values
//! - `f32` label
//!
//! Record size depends only on `k`. A one-hot user/item row takes 28 payload
//! bytes (44 framed) whatever the feature count is.
//!
//! When the stream is compressed, each payload is compressed individually
//! before framing and the checksums cover the compressed bytes.
//!
//! # Example
//!
//! ```
//! use fmrec_data::record::{decode, encode};
//! use fmrec_data::sparse::{SparseDataset, SparseRow};
//!
//! let rows = vec![
//!     SparseRow::one_hot(10, vec![1, 7], 4.0).unwrap(),
//!     SparseRow::one_hot(10, vec![0, 9], 2.0).unwrap(),
//! ];
//! let dataset = SparseDataset::new(10, rows).unwrap();
//!
//! let stream = encode(&dataset).unwrap();
//! assert_eq!(stream.len(), 2);
//! assert_eq!(decode(&stream).unwrap(), dataset);
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::{self, Read, Write};
use std::ops::Range;
use thiserror::Error;

use crate::compression::{self, CompressionError, CompressionType};
use crate::sparse::{RowError, SparseDataset, SparseRow};

/// Largest payload accepted on either side of the codec.
pub const MAX_RECORD_BYTES: usize = 64 * 1024 * 1024;

/// Bytes taken by the frame around each payload.
pub const FRAME_OVERHEAD: usize = 8 + 4 + 4;

const HEADER_BYTES: usize = 4 + 4;
const LABEL_BYTES: usize = 4;
const ENTRY_BYTES: usize = 4 + 4;
const CRC_MASK_DELTA: u32 = 0xa282_ead8;

/// Errors raised while encoding rows.
#[derive(Error, Debug)]
pub enum EncodingError {
    /// Nothing to encode.
    #[error("cannot encode an empty dataset")]
    EmptyDataset,

    /// A row broke the sparse row invariants.
    #[error("row {row}: {source}")]
    InvalidRow {
        /// Position of the row.
        row: usize,
        /// What was wrong with it.
        source: RowError,
    },

    /// A row addresses a different feature space than the dataset.
    #[error("row {row}: feature count {actual} does not match dataset feature count {expected}")]
    FeatureCountMismatch {
        /// Position of the row.
        row: usize,
        /// The dataset's feature count.
        expected: u32,
        /// The row's feature count.
        actual: u32,
    },

    /// The encoded payload would exceed [`MAX_RECORD_BYTES`].
    #[error("row {row}: payload of {size} bytes exceeds the {limit} byte record limit")]
    PayloadTooLarge {
        /// Position of the row.
        row: usize,
        /// Encoded payload size.
        size: usize,
        /// The limit.
        limit: usize,
    },

    /// Compressing the payload failed.
    #[error("row {row}: {source}")]
    Compression {
        /// Position of the row.
        row: usize,
        /// The codec error.
        source: CompressionError,
    },

    /// Writing the record failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while decoding records.
#[derive(Error, Debug)]
pub enum DecodingError {
    /// The input ended inside a record.
    #[error("record {record}: truncated, needed {needed} bytes but only {available} remain")]
    Truncated {
        /// Position of the record.
        record: usize,
        /// Bytes required to finish the current field.
        needed: u64,
        /// Bytes actually left.
        available: u64,
    },

    /// A frame checksum did not match.
    #[error("record {record}: {section} checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// Position of the record.
        record: usize,
        /// `"length"` or `"payload"`.
        section: &'static str,
        /// Checksum computed over the bytes read.
        expected: u32,
        /// Checksum stored in the frame.
        actual: u32,
    },

    /// The frame declares a payload larger than [`MAX_RECORD_BYTES`].
    #[error("record {record}: payload of {size} bytes exceeds the {limit} byte record limit")]
    PayloadTooLarge {
        /// Position of the record.
        record: usize,
        /// Declared size.
        size: u64,
        /// The limit.
        limit: usize,
    },

    /// The payload is shorter than its declared nonzero count requires.
    #[error("record {record}: header declares {declared} nonzeros but the payload holds {present}")]
    CountMismatch {
        /// Position of the record.
        record: usize,
        /// Nonzero count from the header.
        declared: u32,
        /// Complete index/value pairs actually present.
        present: usize,
    },

    /// The payload continues past the label.
    #[error("record {record}: {extra} unexpected bytes after the label")]
    TrailingBytes {
        /// Position of the record.
        record: usize,
        /// Number of extra bytes.
        extra: usize,
    },

    /// The decoded row broke the sparse row invariants.
    #[error("record {record}: {source}")]
    InvalidRow {
        /// Position of the record.
        record: usize,
        /// What was wrong with it.
        source: RowError,
    },

    /// A record addresses a different feature space than the first record.
    #[error("record {record}: feature count {actual} does not match stream feature count {expected}")]
    FeatureCountMismatch {
        /// Position of the record.
        record: usize,
        /// Feature count of record 0.
        expected: u32,
        /// Feature count of this record.
        actual: u32,
    },

    /// The stream holds no records.
    #[error("record stream is empty")]
    Empty,

    /// Decompressing the payload failed.
    #[error("record {record}: {source}")]
    Compression {
        /// Position of the record.
        record: usize,
        /// The codec error.
        source: CompressionError,
    },

    /// Reading the input failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Payload size of a row with `nnz` nonzeros, before compression.
pub fn encoded_len(nnz: usize) -> usize {
    HEADER_BYTES + nnz * ENTRY_BYTES + LABEL_BYTES
}

fn masked_crc(data: &[u8]) -> u32 {
    crc32fast::hash(data)
        .rotate_right(15)
        .wrapping_add(CRC_MASK_DELTA)
}

fn encode_payload(row_index: usize, row: &SparseRow) -> Result<BytesMut, EncodingError> {
    row.validate().map_err(|source| EncodingError::InvalidRow {
        row: row_index,
        source,
    })?;

    let size = encoded_len(row.nnz());
    if size > MAX_RECORD_BYTES {
        return Err(EncodingError::PayloadTooLarge {
            row: row_index,
            size,
            limit: MAX_RECORD_BYTES,
        });
    }

    let mut buf = BytesMut::with_capacity(size);
    buf.put_u32_le(row.feature_count);
    // Bounded by feature_count since indices are unique and in range.
    buf.put_u32_le(row.nnz() as u32);
    for &index in &row.indices {
        buf.put_u32_le(index);
    }
    for &value in &row.values {
        buf.put_f32_le(value);
    }
    buf.put_f32_le(row.label);
    Ok(buf)
}

fn decode_payload(record: usize, mut payload: &[u8]) -> Result<SparseRow, DecodingError> {
    let total = payload.len();
    if total < HEADER_BYTES {
        return Err(DecodingError::Truncated {
            record,
            needed: HEADER_BYTES as u64,
            available: total as u64,
        });
    }

    let feature_count = payload.get_u32_le();
    let nnz = payload.get_u32_le();
    let expected = HEADER_BYTES as u64 + nnz as u64 * ENTRY_BYTES as u64 + LABEL_BYTES as u64;

    if (total as u64) < expected {
        return Err(DecodingError::CountMismatch {
            record,
            declared: nnz,
            present: total.saturating_sub(HEADER_BYTES + LABEL_BYTES) / ENTRY_BYTES,
        });
    }
    if (total as u64) > expected {
        return Err(DecodingError::TrailingBytes {
            record,
            extra: (total as u64 - expected) as usize,
        });
    }

    let nnz = nnz as usize;
    let mut indices = Vec::with_capacity(nnz);
    for _ in 0..nnz {
        indices.push(payload.get_u32_le());
    }
    let mut values = Vec::with_capacity(nnz);
    for _ in 0..nnz {
        values.push(payload.get_f32_le());
    }
    let label = payload.get_f32_le();

    SparseRow::new(feature_count, indices, values, label)
        .map_err(|source| DecodingError::InvalidRow { record, source })
}

/// Encodes a single row into an unframed, uncompressed payload.
///
/// # Errors
///
/// Returns [`EncodingError::InvalidRow`] if the row breaks its invariants.
pub fn encode_row(row: &SparseRow) -> Result<Bytes, EncodingError> {
    Ok(encode_payload(0, row)?.freeze())
}

/// Decodes a single unframed, uncompressed payload.
pub fn decode_row(payload: &[u8]) -> Result<SparseRow, DecodingError> {
    decode_payload(0, payload)
}

fn put_frame(buf: &mut BytesMut, payload: &[u8]) {
    let length = (payload.len() as u64).to_le_bytes();
    buf.reserve(FRAME_OVERHEAD + payload.len());
    buf.put_slice(&length);
    buf.put_u32_le(masked_crc(&length));
    buf.put_slice(payload);
    buf.put_u32_le(masked_crc(payload));
}

/// Locates the payload of the frame at the start of `data`.
///
/// Returns the payload range and the total number of bytes the frame spans.
fn split_frame(data: &[u8], record: usize) -> Result<(Range<usize>, usize), DecodingError> {
    if data.len() < 12 {
        return Err(DecodingError::Truncated {
            record,
            needed: 12,
            available: data.len() as u64,
        });
    }

    let mut header = &data[..12];
    let length_bytes = &data[..8];
    let length = header.get_u64_le();
    let length_crc = header.get_u32_le();

    let expected = masked_crc(length_bytes);
    if length_crc != expected {
        return Err(DecodingError::ChecksumMismatch {
            record,
            section: "length",
            expected,
            actual: length_crc,
        });
    }
    if length > MAX_RECORD_BYTES as u64 {
        return Err(DecodingError::PayloadTooLarge {
            record,
            size: length,
            limit: MAX_RECORD_BYTES,
        });
    }

    let length = length as usize;
    let frame_len = FRAME_OVERHEAD + length;
    if data.len() < frame_len {
        return Err(DecodingError::Truncated {
            record,
            needed: (frame_len - 12) as u64,
            available: (data.len() - 12) as u64,
        });
    }

    let payload = 12..12 + length;
    let mut trailer = &data[payload.end..frame_len];
    let payload_crc = trailer.get_u32_le();
    let expected = masked_crc(&data[payload.clone()]);
    if payload_crc != expected {
        return Err(DecodingError::ChecksumMismatch {
            record,
            section: "payload",
            expected,
            actual: payload_crc,
        });
    }

    Ok((payload, frame_len))
}

/// An ordered sequence of framed sparse records.
///
/// Built with [`RecordStreamBuilder`] or [`encode`]; read-only afterwards.
/// Cloning is cheap: the bytes are reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordStream {
    data: Bytes,
    records: usize,
    compression: CompressionType,
}

impl RecordStream {
    /// Wraps previously persisted bytes, checking every frame.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodingError`] for the first truncated or corrupt frame.
    pub fn from_bytes(
        data: impl Into<Bytes>,
        compression: CompressionType,
    ) -> Result<Self, DecodingError> {
        let data = data.into();
        let mut position = 0;
        let mut records = 0;
        while position < data.len() {
            let (_, consumed) = split_frame(&data[position..], records)?;
            position += consumed;
            records += 1;
        }
        Ok(Self {
            data,
            records,
            compression,
        })
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records
    }

    /// Returns `true` if the stream holds no records.
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Size of the framed stream in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Payload codec used by every record.
    pub fn compression(&self) -> CompressionType {
        self.compression
    }

    /// The framed bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the stream and returns the framed bytes.
    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Iterates over the uncompressed payloads in order.
    pub fn payloads(&self) -> Payloads {
        Payloads {
            data: self.data.clone(),
            position: 0,
            record: 0,
            compression: self.compression,
        }
    }
}

/// Iterator over the payloads of a [`RecordStream`].
///
/// Stops after the first error.
pub struct Payloads {
    data: Bytes,
    position: usize,
    record: usize,
    compression: CompressionType,
}

impl Iterator for Payloads {
    type Item = Result<Bytes, DecodingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.data.len() {
            return None;
        }

        let record = self.record;
        let result = split_frame(&self.data[self.position..], record).and_then(|(range, used)| {
            let start = self.position + range.start;
            let stored = self.data.slice(start..start + range.len());
            self.position += used;
            match self.compression {
                CompressionType::None => Ok(stored),
                codec => compression::decompress(&stored, codec)
                    .map(Bytes::from)
                    .map_err(|source| DecodingError::Compression { record, source }),
            }
        });

        self.record += 1;
        if result.is_err() {
            self.position = self.data.len();
        }
        Some(result)
    }
}

/// Append-only builder for a [`RecordStream`].
///
/// ```
/// use fmrec_data::record::RecordStreamBuilder;
/// use fmrec_data::sparse::SparseRow;
///
/// let mut builder = RecordStreamBuilder::new(100_000);
/// builder.push(&SparseRow::one_hot(100_000, vec![17, 94_512], 5.0).unwrap()).unwrap();
/// let stream = builder.finish().unwrap();
/// assert_eq!(stream.byte_len(), 44);
/// ```
#[derive(Debug)]
pub struct RecordStreamBuilder {
    feature_count: u32,
    buf: BytesMut,
    records: usize,
    compression: CompressionType,
}

impl RecordStreamBuilder {
    /// Creates a builder for rows addressing `feature_count` columns.
    pub fn new(feature_count: u32) -> Self {
        Self {
            feature_count,
            buf: BytesMut::new(),
            records: 0,
            compression: CompressionType::None,
        }
    }

    /// Sets the payload codec.
    pub fn with_compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Number of records appended so far.
    pub fn len(&self) -> usize {
        self.records
    }

    /// Returns `true` if nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Appends one row.
    ///
    /// # Errors
    ///
    /// Fails if the row is malformed, addresses another feature space, is too
    /// large or cannot be compressed. Nothing is appended on failure.
    pub fn push(&mut self, row: &SparseRow) -> Result<(), EncodingError> {
        let index = self.records;
        if row.feature_count != self.feature_count {
            return Err(EncodingError::FeatureCountMismatch {
                row: index,
                expected: self.feature_count,
                actual: row.feature_count,
            });
        }

        let payload = encode_payload(index, row)?;
        match self.compression {
            CompressionType::None => put_frame(&mut self.buf, &payload),
            codec => {
                let stored = compression::compress(&payload, codec)
                    .map_err(|source| EncodingError::Compression { row: index, source })?;
                put_frame(&mut self.buf, &stored);
            }
        }
        self.records += 1;
        Ok(())
    }

    /// Seals the stream.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::EmptyDataset`] if no row was appended.
    pub fn finish(self) -> Result<RecordStream, EncodingError> {
        if self.records == 0 {
            return Err(EncodingError::EmptyDataset);
        }
        Ok(RecordStream {
            data: self.buf.freeze(),
            records: self.records,
            compression: self.compression,
        })
    }
}

/// Encodes a dataset into an uncompressed record stream.
///
/// # Errors
///
/// Returns [`EncodingError::EmptyDataset`] for a dataset without rows.
pub fn encode(dataset: &SparseDataset) -> Result<RecordStream, EncodingError> {
    encode_with(dataset, CompressionType::None)
}

/// Encodes a dataset with the given payload codec.
pub fn encode_with(
    dataset: &SparseDataset,
    compression: CompressionType,
) -> Result<RecordStream, EncodingError> {
    encode_rows(dataset.feature_count(), dataset.rows(), compression)
}

/// Encodes raw rows that have not been assembled into a dataset.
///
/// Every row is checked against `feature_count` and the row invariants.
pub fn encode_rows(
    feature_count: u32,
    rows: &[SparseRow],
    compression: CompressionType,
) -> Result<RecordStream, EncodingError> {
    if rows.is_empty() {
        return Err(EncodingError::EmptyDataset);
    }

    let mut builder = RecordStreamBuilder::new(feature_count).with_compression(compression);
    for row in rows {
        builder.push(row)?;
    }
    let stream = builder.finish()?;

    tracing::debug!(
        records = stream.len(),
        bytes = stream.byte_len(),
        feature_count,
        %compression,
        "Encoded sparse records"
    );
    Ok(stream)
}

/// Decodes a record stream back into a dataset.
///
/// # Errors
///
/// Returns [`DecodingError::Empty`] for a stream without records, or the
/// first framing, payload or consistency error encountered.
pub fn decode(stream: &RecordStream) -> Result<SparseDataset, DecodingError> {
    if stream.is_empty() {
        return Err(DecodingError::Empty);
    }

    let mut rows: Vec<SparseRow> = Vec::with_capacity(stream.len());
    for (record, payload) in stream.payloads().enumerate() {
        let row = decode_payload(record, &payload?)?;
        if let Some(first) = rows.first() {
            let expected = first.feature_count;
            if row.feature_count != expected {
                return Err(DecodingError::FeatureCountMismatch {
                    record,
                    expected,
                    actual: row.feature_count,
                });
            }
        }
        rows.push(row);
    }

    let feature_count = rows[0].feature_count;
    Ok(SparseDataset::from_validated(feature_count, rows))
}

/// Decodes framed bytes produced by [`encode`] or a [`RecordWriter`].
pub fn decode_bytes(
    data: impl Into<Bytes>,
    compression: CompressionType,
) -> Result<SparseDataset, DecodingError> {
    decode(&RecordStream::from_bytes(data, compression)?)
}

/// Streams framed records to any writer.
///
/// The first row written fixes the feature space; later rows must match it.
pub struct RecordWriter<W> {
    writer: W,
    compression: CompressionType,
    feature_count: Option<u32>,
    records: usize,
    frame: BytesMut,
}

impl<W: Write> RecordWriter<W> {
    /// Creates a writer producing uncompressed records.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            compression: CompressionType::None,
            feature_count: None,
            records: 0,
            frame: BytesMut::new(),
        }
    }

    /// Sets the payload codec.
    pub fn with_compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Number of records written.
    pub fn records_written(&self) -> usize {
        self.records
    }

    /// Feature count of the rows written so far, if any.
    pub fn feature_count(&self) -> Option<u32> {
        self.feature_count
    }

    /// Encodes and writes one row.
    ///
    /// # Errors
    ///
    /// Fails without writing if the row addresses another feature space than
    /// the rows before it.
    pub fn write_row(&mut self, row: &SparseRow) -> Result<(), EncodingError> {
        let index = self.records;
        if let Some(expected) = self.feature_count {
            if row.feature_count != expected {
                return Err(EncodingError::FeatureCountMismatch {
                    row: index,
                    expected,
                    actual: row.feature_count,
                });
            }
        }

        let payload = encode_payload(index, row)?;
        let stored = match self.compression {
            CompressionType::None => payload.freeze(),
            codec => compression::compress(&payload, codec)
                .map(Bytes::from)
                .map_err(|source| EncodingError::Compression { row: index, source })?,
        };

        self.frame.clear();
        put_frame(&mut self.frame, &stored);
        self.writer.write_all(&self.frame)?;
        self.feature_count.get_or_insert(row.feature_count);
        self.records += 1;
        Ok(())
    }

    /// Writes every row of a dataset.
    pub fn write_dataset(&mut self, dataset: &SparseDataset) -> Result<(), EncodingError> {
        for row in dataset {
            self.write_row(row)?;
        }
        Ok(())
    }

    /// Flushes the underlying writer.
    pub fn flush(&mut self) -> Result<(), EncodingError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Reads framed records from any reader.
pub struct RecordReader<R> {
    reader: R,
    compression: CompressionType,
    records: usize,
}

impl<R: Read> RecordReader<R> {
    /// Creates a reader expecting uncompressed records.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            compression: CompressionType::None,
            records: 0,
        }
    }

    /// Sets the payload codec.
    pub fn with_compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Reads the next uncompressed payload.
    ///
    /// Returns `Ok(None)` at a clean end of input.
    pub fn read_payload(&mut self) -> Result<Option<Bytes>, DecodingError> {
        let record = self.records;

        let mut header = [0u8; 12];
        let got = read_up_to(&mut self.reader, &mut header)?;
        if got == 0 {
            return Ok(None);
        }
        if got < header.len() {
            return Err(DecodingError::Truncated {
                record,
                needed: header.len() as u64,
                available: got as u64,
            });
        }

        // Validate the length before allocating for it.
        let length = (&header[..8]).get_u64_le();
        let length_crc = (&header[8..]).get_u32_le();
        let expected = masked_crc(&header[..8]);
        if length_crc != expected {
            return Err(DecodingError::ChecksumMismatch {
                record,
                section: "length",
                expected,
                actual: length_crc,
            });
        }
        if length > MAX_RECORD_BYTES as u64 {
            return Err(DecodingError::PayloadTooLarge {
                record,
                size: length,
                limit: MAX_RECORD_BYTES,
            });
        }

        let mut body = vec![0u8; length as usize + 4];
        let got = read_up_to(&mut self.reader, &mut body)?;
        if got < body.len() {
            return Err(DecodingError::Truncated {
                record,
                needed: body.len() as u64,
                available: got as u64,
            });
        }

        let (stored, trailer) = body.split_at(length as usize);
        let payload_crc = (&trailer[..]).get_u32_le();
        let expected = masked_crc(stored);
        if payload_crc != expected {
            return Err(DecodingError::ChecksumMismatch {
                record,
                section: "payload",
                expected,
                actual: payload_crc,
            });
        }

        let payload = match self.compression {
            CompressionType::None => {
                body.truncate(length as usize);
                Bytes::from(body)
            }
            codec => compression::decompress(stored, codec)
                .map(Bytes::from)
                .map_err(|source| DecodingError::Compression { record, source })?,
        };
        self.records += 1;
        Ok(Some(payload))
    }

    /// Reads and decodes the next row.
    pub fn read_row(&mut self) -> Result<Option<SparseRow>, DecodingError> {
        let record = self.records;
        match self.read_payload()? {
            Some(payload) => Ok(Some(decode_payload(record, &payload)?)),
            None => Ok(None),
        }
    }

    /// Reads every remaining record into a dataset.
    pub fn read_dataset(mut self) -> Result<SparseDataset, DecodingError> {
        let mut rows: Vec<SparseRow> = Vec::new();
        while let Some(row) = self.read_row()? {
            if let Some(first) = rows.first() {
                if row.feature_count != first.feature_count {
                    return Err(DecodingError::FeatureCountMismatch {
                        record: rows.len(),
                        expected: first.feature_count,
                        actual: row.feature_count,
                    });
                }
            }
            rows.push(row);
        }

        let feature_count = rows.first().ok_or(DecodingError::Empty)?.feature_count;
        Ok(SparseDataset::from_validated(feature_count, rows))
    }
}

/// Fills `buf` as far as the reader allows, returning the bytes read.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
