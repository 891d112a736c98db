pub mod codec;
pub mod common_config;
pub mod error;
pub mod manifest;
pub mod meta;
pub mod reassemble;
mod skip;

pub use codec::{compress_chunk, decode_chunk, max_compression_level, CompressionOutcome};
pub use error::{ChunkCdnError, Result};
pub use manifest::{
    decode_manifest, encode_manifest, encode_manifest_compressed, read_manifest, write_manifest,
    Manifest,
};
pub use meta::{ChunkDescriptor, ChunkEncoding, FileMeta, ResolvedChunk};
pub use reassemble::{reassemble, ChunkSource, DirChunkSource, ReassemblyReport};
pub use skip::{is_probably_compressed, should_skip_compression};

/// A source file that could not be chunked, and why.
#[derive(Debug)]
pub struct FileFailure {
    pub key: String,
    pub error: ChunkCdnError,
}

#[derive(Debug, Default)]
pub struct ChunkingReport {
    pub total_files: u64,
    pub chunked_files: u64,
    pub skipped_entries: u64,
    pub total_bytes_in: u64,
    pub total_bytes_out: u64,
    pub compressed_chunks: u64,
    pub raw_chunks: u64,
    pub chunks: u64,
    pub failures: Vec<FileFailure>,
}

impl ChunkingReport {
    /// Stored size as a percentage of the source size (0.0–100.0).
    pub fn compression_ratio(&self) -> f32 {
        if self.total_bytes_in == 0 {
            return 100.0;
        }
        (self.total_bytes_out as f64 / self.total_bytes_in as f64 * 100.0) as f32
    }

    pub fn add_file(&mut self, file: &FileMeta) {
        self.chunked_files += 1;
        self.total_bytes_in += file.source_length;
        self.total_bytes_out += file.stored_length();
        for chunk in &file.chunks {
            self.chunks += 1;
            match chunk.encoding {
                ChunkEncoding::Zstd => self.compressed_chunks += 1,
                ChunkEncoding::Raw => self.raw_chunks += 1,
            }
        }
    }
}
