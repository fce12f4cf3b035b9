//! Error types for stratacache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur inside the cache.
///
/// Only [`Error::KeyDerivation`] ever reaches a caller of the public
/// `get`/`set` API; storage-layer variants are contained at the tier
/// boundary and degrade to cache misses.
#[derive(Error, Debug)]
pub enum Error {
    /// A parameter value could not be serialized into the canonical key record
    #[error("key derivation failed: {reason}")]
    KeyDerivation { reason: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Entry could not be serialized for disk storage
    #[error("entry encoding failed: {0}")]
    EntryEncode(#[source] serde_json::Error),

    /// Entry bytes read from disk could not be deserialized
    #[error("entry decoding failed: {0}")]
    EntryDecode(#[source] serde_json::Error),

    /// A framed cache record had an unrecognized or truncated header
    #[error("corrupt cache record: {reason}")]
    CorruptRecord { reason: String },

    /// Compression failed
    #[error("compression with {algorithm} failed: {reason}")]
    CompressionFailed { algorithm: String, reason: String },

    /// Decompression failed
    #[error("decompression with {algorithm} failed: {reason}")]
    DecompressionFailed { algorithm: String, reason: String },
}
