//! Cache Record Codec
//!
//! Frames every disk-tier record: a fixed header carries the format version
//! and the compression algorithm, the body is the (optionally
//! LZ4-compressed) serialized entry. Tiny bodies and bodies that do not
//! shrink are stored raw, so encoding never fails; decoding rejects
//! anything with a bad header as corrupt.

use bytes::Bytes;
use tracing::warn;

use crate::error::{Error, Result};

/// Magic bytes opening every framed record
const RECORD_MAGIC: [u8; 2] = *b"SC";

/// On-disk record format version
const RECORD_VERSION: u8 = 1;

/// Header length: magic + version + algorithm id
const HEADER_LEN: usize = 4;

// =============================================================================
// Compression Algorithm
// =============================================================================

/// Supported compression algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionAlgorithm {
    /// No compression
    None,
    /// LZ4 - fast compression
    Lz4,
}

impl CompressionAlgorithm {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            CompressionAlgorithm::None => "none",
            CompressionAlgorithm::Lz4 => "lz4",
        }
    }

    /// Single-byte id stored in record headers
    fn id(&self) -> u8 {
        match self {
            CompressionAlgorithm::None => 0,
            CompressionAlgorithm::Lz4 => 1,
        }
    }

    /// Reverse of [`CompressionAlgorithm::id`]; an unknown id means a
    /// corrupt or foreign record
    fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(CompressionAlgorithm::None),
            1 => Some(CompressionAlgorithm::Lz4),
            _ => None,
        }
    }
}

impl Default for CompressionAlgorithm {
    fn default() -> Self {
        CompressionAlgorithm::Lz4
    }
}

impl std::fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Compression Configuration
// =============================================================================

/// Configuration for record compression
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    /// Algorithm applied to large-enough records
    pub algorithm: CompressionAlgorithm,
    /// Records below this size are stored raw; compressing them would only
    /// add header overhead
    pub min_size_bytes: u64,
    /// Compression level (algorithm-specific)
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            algorithm: CompressionAlgorithm::Lz4,
            min_size_bytes: 512,
            level: 3,
        }
    }
}

// =============================================================================
// Compressors
// =============================================================================

/// Trait for compression implementations
pub trait Compressor: Send + Sync {
    /// Get the algorithm identifier
    fn algorithm(&self) -> CompressionAlgorithm;

    /// Compress data
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress data
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Pass-through compressor (no compression)
struct NoopCompressor;

impl Compressor for NoopCompressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::None
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

/// LZ4 compressor (fast compression)
struct Lz4Compressor {
    level: i32,
}

impl Compressor for Lz4Compressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Lz4
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::compress(
            data,
            Some(lz4::block::CompressionMode::HIGHCOMPRESSION(self.level)),
            true,
        )
        .map_err(|e| Error::CompressionFailed {
            algorithm: "LZ4".into(),
            reason: e.to_string(),
        })
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::decompress(data, None).map_err(|e| Error::DecompressionFailed {
            algorithm: "LZ4".into(),
            reason: e.to_string(),
        })
    }
}

// =============================================================================
// Record Codec
// =============================================================================

/// Encoder/decoder for framed disk records
pub struct RecordCodec {
    config: CompressionConfig,
    noop: NoopCompressor,
    lz4: Lz4Compressor,
}

impl RecordCodec {
    /// Create with custom config
    pub fn with_config(config: CompressionConfig) -> Self {
        Self {
            lz4: Lz4Compressor {
                level: config.level,
            },
            noop: NoopCompressor,
            config,
        }
    }

    fn compressor(&self, algorithm: CompressionAlgorithm) -> &dyn Compressor {
        match algorithm {
            CompressionAlgorithm::None => &self.noop,
            CompressionAlgorithm::Lz4 => &self.lz4,
        }
    }

    /// Frame a record body for disk storage.
    ///
    /// Compression is best-effort: a body that is tiny, incompressible, or
    /// rejected by the compressor is framed raw instead, so this never
    /// fails.
    pub fn encode(&self, body: &[u8]) -> Vec<u8> {
        let (payload, algorithm) = self.squeeze(body);

        let mut framed = Vec::with_capacity(HEADER_LEN + payload.len());
        framed.extend_from_slice(&RECORD_MAGIC);
        framed.push(RECORD_VERSION);
        framed.push(algorithm.id());
        framed.extend_from_slice(&payload);
        framed
    }

    fn squeeze(&self, body: &[u8]) -> (Vec<u8>, CompressionAlgorithm) {
        if (body.len() as u64) < self.config.min_size_bytes
            || self.config.algorithm == CompressionAlgorithm::None
        {
            return (body.to_vec(), CompressionAlgorithm::None);
        }

        match self.compressor(self.config.algorithm).compress(body) {
            // Keep the compressed form only when it actually shrank
            Ok(compressed) if compressed.len() < body.len() => {
                (compressed, self.config.algorithm)
            }
            Ok(_) => (body.to_vec(), CompressionAlgorithm::None),
            Err(e) => {
                warn!("compression failed, framing raw: {e}");
                (body.to_vec(), CompressionAlgorithm::None)
            }
        }
    }

    /// Recover the record body from framed bytes.
    ///
    /// A short buffer, wrong magic, unknown version, or unknown algorithm id
    /// is reported as [`Error::CorruptRecord`]; the disk tier turns that
    /// into a self-healing miss.
    pub fn decode(&self, framed: &[u8]) -> Result<Bytes> {
        if framed.len() < HEADER_LEN {
            return Err(Error::CorruptRecord {
                reason: format!("{} bytes is shorter than the header", framed.len()),
            });
        }
        if framed[..2] != RECORD_MAGIC {
            return Err(Error::CorruptRecord {
                reason: "bad magic".to_string(),
            });
        }
        if framed[2] != RECORD_VERSION {
            return Err(Error::CorruptRecord {
                reason: format!("unknown record version {}", framed[2]),
            });
        }
        let algorithm = CompressionAlgorithm::from_id(framed[3]).ok_or(Error::CorruptRecord {
            reason: format!("unknown compression id {}", framed[3]),
        })?;

        let body = self.compressor(algorithm).decompress(&framed[HEADER_LEN..])?;
        Ok(Bytes::from(body))
    }

    /// Get configuration
    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self::with_config(CompressionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_BODY: &[u8] = b"{\"score\":87,\"issues\":[\"missing meta description\",\
        \"missing meta description\",\"missing meta description\",\"thin content\",\
        \"thin content\",\"thin content\",\"thin content\",\"thin content\",\
        \"slow response\",\"slow response\",\"slow response\",\"slow response\",\
        \"slow response\",\"slow response\",\"slow response\",\"slow response\",\
        \"slow response\",\"slow response\",\"slow response\",\"slow response\",\
        \"slow response\",\"slow response\",\"slow response\",\"slow response\",\
        \"slow response\",\"slow response\",\"slow response\",\"slow response\",\
        \"slow response\",\"slow response\",\"slow response\",\"slow response\"]}";

    #[test]
    fn test_roundtrip_compressed() {
        let codec = RecordCodec::default();

        let framed = codec.encode(TEST_BODY);
        // Repetitive JSON shrinks even with the header added
        assert!(framed.len() < TEST_BODY.len());
        assert_eq!(framed[3], CompressionAlgorithm::Lz4.id());

        assert_eq!(codec.decode(&framed).unwrap().as_ref(), TEST_BODY);
    }

    #[test]
    fn test_tiny_body_framed_raw() {
        let codec = RecordCodec::default();

        let framed = codec.encode(b"tiny");
        assert_eq!(framed[3], CompressionAlgorithm::None.id());
        assert_eq!(codec.decode(&framed).unwrap().as_ref(), b"tiny");
    }

    #[test]
    fn test_incompressible_body_framed_raw() {
        let codec = RecordCodec::default();

        // Pseudo-random bytes that LZ4 cannot shrink
        let noise: Vec<u8> = (0..2000u32)
            .map(|i| (i.wrapping_mul(2654435761) >> 13) as u8)
            .collect();

        let framed = codec.encode(&noise);
        assert_eq!(codec.decode(&framed).unwrap().as_ref(), noise.as_slice());
    }

    #[test]
    fn test_compression_disabled_by_config() {
        let codec = RecordCodec::with_config(CompressionConfig {
            algorithm: CompressionAlgorithm::None,
            ..CompressionConfig::default()
        });

        let framed = codec.encode(TEST_BODY);
        assert_eq!(framed[3], CompressionAlgorithm::None.id());
        assert_eq!(framed.len(), TEST_BODY.len() + 4);
    }

    #[test]
    fn test_decode_rejects_short_buffer() {
        use assert_matches::assert_matches;

        let codec = RecordCodec::default();
        assert_matches!(codec.decode(b"SC"), Err(Error::CorruptRecord { .. }));
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        use assert_matches::assert_matches;

        let codec = RecordCodec::default();
        let err = codec.decode(b"XXganything").unwrap_err();
        assert_matches!(err, Error::CorruptRecord { .. });
    }

    #[test]
    fn test_decode_rejects_unknown_algorithm() {
        use assert_matches::assert_matches;

        let codec = RecordCodec::default();
        let framed = [b'S', b'C', RECORD_VERSION, 99, 1, 2, 3];
        assert_matches!(codec.decode(&framed), Err(Error::CorruptRecord { .. }));
    }

    #[test]
    fn test_decode_rejects_garbled_compressed_body() {
        use assert_matches::assert_matches;

        let codec = RecordCodec::default();
        let framed = [b'S', b'C', RECORD_VERSION, CompressionAlgorithm::Lz4.id(), 0xFF, 0xFF];
        assert_matches!(
            codec.decode(&framed),
            Err(Error::DecompressionFailed { .. })
        );
    }
}
