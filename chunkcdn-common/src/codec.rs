// chunkcdn-common/src/codec.rs

use std::io::Read;

use crate::meta::ChunkEncoding;

/// Upper bound on the buffer reserved before a frame is decoded. Larger
/// chunks grow the buffer as data actually arrives.
const MAX_DECODE_PREALLOC: u64 = 32 * 1024 * 1024;

/// Result of the compression attempt on one chunk payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressionOutcome {
    Compressed(Vec<u8>),
    Raw(Vec<u8>),
}

impl CompressionOutcome {
    pub fn encoding(&self) -> ChunkEncoding {
        match self {
            Self::Compressed(_) => ChunkEncoding::Zstd,
            Self::Raw(_) => ChunkEncoding::Raw,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Compressed(b) | Self::Raw(b) => b,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Compressed(b) | Self::Raw(b) => b,
        }
    }
}

/// Highest level the linked zstd accepts.
pub fn max_compression_level() -> i32 {
    *zstd::compression_level_range().end()
}

/// Compress `raw` at `level` and keep the result only if it is strictly smaller.
///
/// When the zstd frame is not smaller than the input the raw bytes are kept
/// as they are, so a stored raw chunk always has exactly the source length.
pub fn compress_chunk(raw: Vec<u8>, level: i32) -> std::io::Result<CompressionOutcome> {
    let compressed = zstd::bulk::compress(&raw, level)?;
    log::debug!(
        "[codec] zstd -{} {} -> {} bytes",
        level,
        raw.len(),
        compressed.len()
    );

    if compressed.len() >= raw.len() {
        Ok(CompressionOutcome::Raw(raw))
    } else {
        Ok(CompressionOutcome::Compressed(compressed))
    }
}

/// Decode stored chunk bytes back into the source bytes.
///
/// `raw_length` comes from the manifest and is not trusted: at most
/// `raw_length + 1` bytes are decoded, so a frame that is longer than
/// announced shows up as a length mismatch rather than an unbounded read.
pub fn decode_chunk(
    encoding: ChunkEncoding,
    stored: Vec<u8>,
    raw_length: u64,
) -> std::io::Result<Vec<u8>> {
    match encoding {
        ChunkEncoding::Raw => Ok(stored),
        ChunkEncoding::Zstd => {
            let capacity = usize::try_from(raw_length.min(MAX_DECODE_PREALLOC)).unwrap_or(0);
            let mut raw = Vec::with_capacity(capacity);
            zstd::stream::Decoder::new(stored.as_slice())?
                .take(raw_length.saturating_add(1))
                .read_to_end(&mut raw)?;
            Ok(raw)
        }
    }
}
