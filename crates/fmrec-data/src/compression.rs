//! Per-record payload compression.
//!
//! A [`RecordStream`](crate::record::RecordStream) may store each sparse
//! payload compressed. Compression happens after the payload is encoded and
//! before it is framed, so the frame checksums always cover the bytes that
//! are actually stored.
//!
//! One-hot payloads are tiny (28 bytes for a user/item pair), so compression
//! mostly pays off for rows with many nonzeros or for dense value lists.
//!
//! ```
//! use fmrec_data::compression::{compress, decompress, CompressionType};
//!
//! let payload = [0u8; 64];
//! let stored = compress(&payload, CompressionType::None).unwrap();
//! assert_eq!(decompress(&stored, CompressionType::None).unwrap(), payload);
//! ```

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

use crate::record::MAX_RECORD_BYTES;

/// Errors raised while compressing or decompressing a payload.
#[derive(Error, Debug)]
pub enum CompressionError {
    /// The codec rejected the input.
    #[error("{codec} codec failed: {source}")]
    Codec {
        /// Codec in use.
        codec: CompressionType,
        /// The codec's error.
        source: io::Error,
    },

    /// The crate was built without the codec's cargo feature.
    #[error("{0} support is not compiled in")]
    Disabled(CompressionType),

    /// The payload inflates past the allowed size.
    #[error("decompressed payload exceeds {limit} bytes")]
    TooLarge {
        /// The limit.
        limit: usize,
    },
}

/// Result type for compression operations.
pub type Result<T> = std::result::Result<T, CompressionError>;

/// Payload codec used inside a record stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionType {
    /// Payloads are stored as-is.
    #[default]
    None,
    /// Gzip (RFC 1952).
    Gzip,
    /// Snappy framed format.
    Snappy,
    /// Zlib (RFC 1950).
    Zlib,
}

const SUFFIXES: [(&str, CompressionType); 6] = [
    (".gz", CompressionType::Gzip),
    (".gzip", CompressionType::Gzip),
    (".snappy", CompressionType::Snappy),
    (".sz", CompressionType::Snappy),
    (".zlib", CompressionType::Zlib),
    (".zz", CompressionType::Zlib),
];

impl CompressionType {
    /// Guesses the payload codec from a record file name.
    ///
    /// ```
    /// use fmrec_data::compression::CompressionType;
    ///
    /// assert_eq!(CompressionType::from_extension("train.rec.gz"), CompressionType::Gzip);
    /// assert_eq!(CompressionType::from_extension("train.rec"), CompressionType::None);
    /// ```
    pub fn from_extension(path: &str) -> Self {
        let lower = path.to_ascii_lowercase();
        SUFFIXES
            .iter()
            .find(|(suffix, _)| lower.ends_with(suffix))
            .map(|&(_, codec)| codec)
            .unwrap_or_default()
    }

    /// File name suffix conventionally used for this codec.
    pub fn extension(&self) -> &'static str {
        match self {
            CompressionType::None => "",
            CompressionType::Gzip => ".gz",
            CompressionType::Snappy => ".snappy",
            CompressionType::Zlib => ".zlib",
        }
    }

    /// Returns `true` if this build can encode and decode the codec.
    pub fn is_available(&self) -> bool {
        match self {
            CompressionType::None => true,
            CompressionType::Gzip | CompressionType::Zlib => cfg!(feature = "gzip"),
            CompressionType::Snappy => cfg!(feature = "snappy"),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            CompressionType::None => "none",
            CompressionType::Gzip => "gzip",
            CompressionType::Snappy => "snappy",
            CompressionType::Zlib => "zlib",
        }
    }
}

impl std::fmt::Display for CompressionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for CompressionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        match wanted.as_str() {
            "" => Ok(CompressionType::None),
            "gz" => Ok(CompressionType::Gzip),
            _ => [
                CompressionType::None,
                CompressionType::Gzip,
                CompressionType::Snappy,
                CompressionType::Zlib,
            ]
            .into_iter()
            .find(|codec| codec.name() == wanted)
            .ok_or_else(|| format!("unknown compression type: {s}")),
        }
    }
}

/// Compresses one encoded payload.
///
/// # Errors
///
/// Returns [`CompressionError::Disabled`] when the codec's cargo feature is
/// off.
pub fn compress(data: &[u8], codec: CompressionType) -> Result<Vec<u8>> {
    let stored = match codec {
        CompressionType::None => Ok(data.to_vec()),
        #[cfg(feature = "gzip")]
        CompressionType::Gzip => write_through(
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default()),
            data,
        )
        .and_then(flate2::write::GzEncoder::finish),
        #[cfg(feature = "gzip")]
        CompressionType::Zlib => write_through(
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default()),
            data,
        )
        .and_then(flate2::write::ZlibEncoder::finish),
        #[cfg(feature = "snappy")]
        CompressionType::Snappy => write_through(snap::write::FrameEncoder::new(Vec::new()), data)
            .and_then(|encoder| {
                encoder
                    .into_inner()
                    .map_err(|e| io::Error::other(e.to_string()))
            }),
        #[allow(unreachable_patterns)]
        disabled => return Err(CompressionError::Disabled(disabled)),
    };
    stored.map_err(|source| CompressionError::Codec { codec, source })
}

/// Restores one stored payload, refusing output over [`MAX_RECORD_BYTES`].
///
/// # Errors
///
/// Returns an error when the codec is unavailable, the bytes are not a valid
/// stream for it or the output grows past the record limit.
pub fn decompress(data: &[u8], codec: CompressionType) -> Result<Vec<u8>> {
    decompress_bounded(data, codec, MAX_RECORD_BYTES)
}

/// Like [`decompress`] with a caller-chosen output limit.
pub fn decompress_bounded(data: &[u8], codec: CompressionType, limit: usize) -> Result<Vec<u8>> {
    let restored = match codec {
        CompressionType::None => Ok(data.to_vec()),
        #[cfg(feature = "gzip")]
        CompressionType::Gzip => read_bounded(flate2::read::GzDecoder::new(data), limit),
        #[cfg(feature = "gzip")]
        CompressionType::Zlib => read_bounded(flate2::read::ZlibDecoder::new(data), limit),
        #[cfg(feature = "snappy")]
        CompressionType::Snappy => read_bounded(snap::read::FrameDecoder::new(data), limit),
        #[allow(unreachable_patterns)]
        disabled => return Err(CompressionError::Disabled(disabled)),
    }
    .map_err(|source| CompressionError::Codec { codec, source })?;

    if restored.len() > limit {
        return Err(CompressionError::TooLarge { limit });
    }
    Ok(restored)
}

#[cfg(any(feature = "gzip", feature = "snappy"))]
fn write_through<W: io::Write>(mut encoder: W, data: &[u8]) -> io::Result<W> {
    encoder.write_all(data)?;
    Ok(encoder)
}

/// Reads at most `limit + 1` bytes so oversized output is detectable.
#[cfg(any(feature = "gzip", feature = "snappy"))]
fn read_bounded<R: io::Read>(decoder: R, limit: usize) -> io::Result<Vec<u8>> {
    use std::io::Read;

    let mut restored = Vec::new();
    decoder
        .take(limit as u64 + 1)
        .read_to_end(&mut restored)?;
    Ok(restored)
}
