use serde::{Deserialize, Serialize};

/// How the stored bytes of a chunk must be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkEncoding {
    /// A single zstd frame.
    Zstd,
    /// The source bytes, stored verbatim.
    Raw,
}

/// Metadata for one stored chunk, as recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkDescriptor {
    pub name: String,
    /// Length of the chunk object as stored.
    pub compressed_length: u64,
    /// Number of source bytes the chunk covers.
    pub raw_length: u64,
    pub encoding: ChunkEncoding,
}

/// A chunk descriptor resolved to a fetchable location. This is the
/// reconstructor's response item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedChunk {
    pub resolved_chunk_location: String,
    pub compressed_length: u64,
    pub raw_length: u64,
    pub encoding: ChunkEncoding,
}

impl ResolvedChunk {
    pub fn new(location: String, chunk: &ChunkDescriptor) -> Self {
        Self {
            resolved_chunk_location: location,
            compressed_length: chunk.compressed_length,
            raw_length: chunk.raw_length,
            encoding: chunk.encoding,
        }
    }
}

/// Per-file outcome of a chunking run.
#[derive(Debug, Clone)]
pub struct FileMeta {
    pub key: String,
    pub source_length: u64,
    pub chunks: Vec<ChunkDescriptor>,
}

impl FileMeta {
    pub fn stored_length(&self) -> u64 {
        self.chunks.iter().map(|c| c.compressed_length).sum()
    }
}
