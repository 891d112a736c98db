//! Bounded-size chunking of one source stream.
//!
//! A source of `N` bytes is cut into `ceil(N / max_chunk_payload)` chunks on
//! pre-compression byte counts, so the chunk count depends on `N` alone. Every
//! chunk but the last holds exactly `max_chunk_payload` source bytes.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use chunkcdn_common::common_config::StrategicConfig;
use chunkcdn_common::{
    compress_chunk, should_skip_compression, ChunkCdnError, ChunkDescriptor, CompressionOutcome,
    FileMeta, Result,
};
use log::{debug, info, warn};

use crate::context::RunContext;
use crate::store::ChunkStore;

/// Number of chunks a source of `total_len` bytes is split into.
pub fn chunk_count(total_len: u64, max_payload: u64) -> u64 {
    assert!(max_payload > 0, "max_payload must be > 0");
    total_len.div_ceil(max_payload)
}

/// Source byte count of every chunk, in read order.
pub fn chunk_lengths(total_len: u64, max_payload: u64) -> impl Iterator<Item = u64> {
    let count = chunk_count(total_len, max_payload);
    (0..count).map(move |i| {
        let start = i * max_payload;
        max_payload.min(total_len - start)
    })
}

#[derive(Debug, Clone)]
pub struct ChunkOptions {
    pub max_chunk_payload: u64,
    pub compression_level: i32,
    pub skip_precompressed: bool,
}

impl From<&StrategicConfig> for ChunkOptions {
    fn from(config: &StrategicConfig) -> Self {
        Self {
            max_chunk_payload: config.max_chunk_payload,
            compression_level: config.compression_level,
            skip_precompressed: config.skip_precompressed,
        }
    }
}

/// Chunks source files into a [`ChunkStore`] and publishes their descriptors
/// into the run's manifest.
pub struct FileChunker<'a, S: ChunkStore + ?Sized> {
    ctx: &'a RunContext,
    store: &'a S,
    options: ChunkOptions,
}

impl<'a, S: ChunkStore + ?Sized> FileChunker<'a, S> {
    pub fn new(ctx: &'a RunContext, store: &'a S, options: ChunkOptions) -> Self {
        assert!(options.max_chunk_payload > 0, "max_chunk_payload must be > 0");
        Self { ctx, store, options }
    }

    /// Open `path` and chunk its first `total_len` bytes under `key`.
    pub fn chunk_file(&self, path: &Path, key: &str, total_len: u64) -> Result<FileMeta> {
        let file = File::open(path).map_err(|e| ChunkCdnError::SourceUnreadable {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.chunk_stream(file, path, key, total_len)
    }

    /// Chunk `total_len` bytes from `reader`. `path` is only used for
    /// compression decisions and error context.
    ///
    /// The descriptor list is published only once every chunk is stored. On
    /// error, chunks already stored for this file stay in the store.
    pub fn chunk_stream<R: Read>(
        &self,
        mut reader: R,
        path: &Path,
        key: &str,
        total_len: u64,
    ) -> Result<FileMeta> {
        if self.ctx.is_published(key) {
            return Err(ChunkCdnError::DuplicateKey { key: key.to_string() });
        }
        let mut chunks = Vec::with_capacity(chunk_count(total_len, self.options.max_chunk_payload) as usize);

        for (chunk_index, raw_len) in chunk_lengths(total_len, self.options.max_chunk_payload).enumerate() {
            let chunk_index = chunk_index as u64;
            let result = read_exact_chunk(&mut reader, path, chunk_index, raw_len)
                .and_then(|raw| self.encode(raw, path, chunk_index))
                .and_then(|outcome| self.store_chunk(outcome, raw_len));

            match result {
                Ok(descriptor) => {
                    debug!(
                        "[chunker] {} : chunk {} = {} ({} -> {} bytes, {:?})",
                        key,
                        chunk_index,
                        descriptor.name,
                        raw_len,
                        descriptor.compressed_length,
                        descriptor.encoding
                    );
                    chunks.push(descriptor);
                }
                Err(e) => {
                    if !chunks.is_empty() {
                        warn!(
                            "[chunker] {}: {} chunk(s) already stored are left in place",
                            key,
                            chunks.len()
                        );
                    }
                    return Err(e);
                }
            }
        }

        let meta = FileMeta {
            key: key.to_string(),
            source_length: total_len,
            chunks,
        };

        if !self.ctx.publish(key, meta.chunks.clone()) {
            warn!(
                "[chunker] {} was published concurrently, {} chunk(s) of this copy are orphaned",
                key,
                meta.chunks.len()
            );
            return Err(ChunkCdnError::DuplicateKey { key: key.to_string() });
        }
        info!(
            "[chunker] {} : {} bytes in {} chunk(s), {} bytes stored",
            key,
            total_len,
            meta.chunks.len(),
            meta.stored_length()
        );
        Ok(meta)
    }

    fn encode(&self, raw: Vec<u8>, path: &Path, chunk_index: u64) -> Result<CompressionOutcome> {
        if !self.attempts_compression(path) {
            return Ok(CompressionOutcome::Raw(raw));
        }
        compress_chunk(raw, self.options.compression_level).map_err(|e| ChunkCdnError::Compression {
            path: path.to_path_buf(),
            chunk_index,
            message: e.to_string(),
        })
    }

    fn attempts_compression(&self, path: &Path) -> bool {
        !should_skip_compression(path, self.options.skip_precompressed)
    }

    fn store_chunk(&self, outcome: CompressionOutcome, raw_len: u64) -> Result<ChunkDescriptor> {
        let name = self.ctx.next_chunk_name();
        let encoding = outcome.encoding();
        let bytes = outcome.into_bytes();

        self.store
            .put(&name, &bytes)
            .map_err(|e| ChunkCdnError::ChunkWrite {
                name: name.clone(),
                source: e,
            })?;

        Ok(ChunkDescriptor {
            name,
            compressed_length: bytes.len() as u64,
            raw_length: raw_len,
            encoding,
        })
    }
}

/// Read exactly `len` bytes, reporting a [`ChunkCdnError::ShortRead`] when
/// the source ends early.
fn read_exact_chunk<R: Read>(reader: &mut R, path: &Path, chunk_index: u64, len: u64) -> Result<Vec<u8>> {
    let len_usize = usize::try_from(len).map_err(|_| ChunkCdnError::ShortRead {
        path: path.to_path_buf(),
        chunk_index,
        expected: len,
        actual: 0,
    })?;
    let mut buf = vec![0u8; len_usize];
    let mut filled = 0;

    while filled < len_usize {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(ChunkCdnError::SourceUnreadable {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        }
    }

    if filled < len_usize {
        return Err(ChunkCdnError::ShortRead {
            path: path.to_path_buf(),
            chunk_index,
            expected: len,
            actual: filled as u64,
        });
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use chunkcdn_common::{reassemble, ChunkEncoding, ResolvedChunk};

    use super::*;
    use crate::store::MemoryChunkStore;

    fn options(max: u64) -> ChunkOptions {
        ChunkOptions {
            max_chunk_payload: max,
            compression_level: 19,
            skip_precompressed: true,
        }
    }

    fn resolved(meta: &FileMeta) -> Vec<ResolvedChunk> {
        meta.chunks
            .iter()
            .map(|c| ResolvedChunk::new(c.name.clone(), c))
            .collect()
    }

    #[test]
    fn test_chunk_lengths_seventy_million() {
        let lengths: Vec<u64> = chunk_lengths(70_000_000, 30_000_000).collect();
        assert_eq!(lengths, [30_000_000, 30_000_000, 10_000_000]);
        assert_eq!(chunk_count(70_000_000, 30_000_000), 3);
    }

    #[test]
    fn test_chunk_lengths_exact_multiple_has_no_empty_tail() {
        let lengths: Vec<u64> = chunk_lengths(60, 30).collect();
        assert_eq!(lengths, [30, 30]);
    }

    #[test]
    fn test_chunk_lengths_empty_source() {
        assert_eq!(chunk_lengths(0, 30).count(), 0);
    }

    #[test]
    fn test_chunk_lengths_sum_to_total() {
        for total in [1u64, 29, 30, 31, 999, 1_000] {
            for max in [1u64, 7, 30, 1_000, 5_000] {
                let lengths: Vec<u64> = chunk_lengths(total, max).collect();
                assert_eq!(lengths.len() as u64, total.div_ceil(max));
                assert_eq!(lengths.iter().sum::<u64>(), total);
                assert!(lengths.iter().all(|&l| l > 0 && l <= max));
            }
        }
    }

    #[test]
    fn test_stream_reassembles_to_source() {
        let ctx = RunContext::with_prefix("T");
        let store = MemoryChunkStore::new();
        let chunker = FileChunker::new(&ctx, &store, options(1000));

        let data: Vec<u8> = (0..4321u32).map(|i| (i % 17) as u8).collect();
        let meta = chunker
            .chunk_stream(Cursor::new(&data), Path::new("data.bin"), "data.bin", data.len() as u64)
            .unwrap();

        assert_eq!(meta.chunks.len(), 5);
        let raw_lengths: Vec<u64> = meta.chunks.iter().map(|c| c.raw_length).collect();
        assert_eq!(raw_lengths, [1000, 1000, 1000, 1000, 321]);

        let mut out = Vec::new();
        reassemble(&resolved(&meta), &store, &mut out).unwrap();
        assert_eq!(out, data);
        assert_eq!(ctx.snapshot().get("data.bin").unwrap(), meta.chunks.as_slice());
    }

    #[test]
    fn test_small_incompressible_chunk_stored_raw() {
        let ctx = RunContext::with_prefix("T");
        let store = MemoryChunkStore::new();
        let chunker = FileChunker::new(&ctx, &store, options(30_000_000));

        let data = b"q7#Lp0zX!m";
        let meta = chunker
            .chunk_stream(Cursor::new(data), Path::new("tiny.bin"), "tiny.bin", 10)
            .unwrap();

        let chunk = &meta.chunks[0];
        assert_eq!(meta.chunks.len(), 1);
        assert_eq!(chunk.encoding, ChunkEncoding::Raw);
        assert_eq!(chunk.compressed_length, 10);
        assert_eq!(store.get(&chunk.name).unwrap(), data);
    }

    #[test]
    fn test_fallback_law_holds_per_chunk() {
        let ctx = RunContext::with_prefix("T");
        let store = MemoryChunkStore::new();
        let chunker = FileChunker::new(&ctx, &store, options(64));

        let mut data = vec![0u8; 64];
        data.extend((0..64u8).map(|i| i.wrapping_mul(151).wrapping_add(7)));
        let meta = chunker
            .chunk_stream(Cursor::new(&data), Path::new("mix.bin"), "mix.bin", data.len() as u64)
            .unwrap();

        for chunk in &meta.chunks {
            let stored = store.get(&chunk.name).unwrap();
            assert_eq!(stored.len() as u64, chunk.compressed_length);
            match chunk.encoding {
                ChunkEncoding::Zstd => assert!(chunk.compressed_length < chunk.raw_length),
                ChunkEncoding::Raw => assert_eq!(chunk.compressed_length, chunk.raw_length),
            }
        }
        assert_eq!(meta.chunks[0].encoding, ChunkEncoding::Zstd);
    }

    #[test]
    fn test_precompressed_extension_skips_compression() {
        let ctx = RunContext::with_prefix("T");
        let store = MemoryChunkStore::new();
        let chunker = FileChunker::new(&ctx, &store, options(1000));

        let data = vec![b'a'; 2000];
        let meta = chunker
            .chunk_stream(Cursor::new(&data), Path::new("video.mp4"), "video.mp4", 2000)
            .unwrap();
        assert!(meta.chunks.iter().all(|c| c.encoding == ChunkEncoding::Raw));
    }

    #[test]
    fn test_short_read_is_reported() {
        let ctx = RunContext::with_prefix("T");
        let store = MemoryChunkStore::new();
        let chunker = FileChunker::new(&ctx, &store, options(100));

        let data = vec![1u8; 250];
        let err = chunker
            .chunk_stream(Cursor::new(&data), Path::new("shrunk.bin"), "shrunk.bin", 300)
            .unwrap_err();

        assert!(
            matches!(
                err,
                ChunkCdnError::ShortRead { chunk_index: 2, expected: 100, actual: 50, .. }
            ),
            "{err}"
        );
        // Nothing is published for a failed file, but earlier chunks stay stored.
        assert!(ctx.snapshot().is_empty());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_empty_source_publishes_empty_list() {
        let ctx = RunContext::with_prefix("T");
        let store = MemoryChunkStore::new();
        let chunker = FileChunker::new(&ctx, &store, options(100));

        let meta = chunker
            .chunk_stream(Cursor::new(Vec::new()), Path::new("empty"), "empty", 0)
            .unwrap();
        assert!(meta.chunks.is_empty());
        assert_eq!(ctx.snapshot().get("empty").unwrap().len(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_duplicate_key_rejected_before_any_chunk_is_stored() {
        let ctx = RunContext::with_prefix("T");
        let store = MemoryChunkStore::new();
        let chunker = FileChunker::new(&ctx, &store, options(10));

        let first = chunker
            .chunk_stream(Cursor::new(vec![1u8; 25]), Path::new("a.bin"), "a.bin", 25)
            .unwrap();
        assert_eq!(store.len(), 3);

        let err = chunker
            .chunk_stream(Cursor::new(vec![2u8; 25]), Path::new("a.bin"), "a.bin", 25)
            .unwrap_err();
        assert!(matches!(err, ChunkCdnError::DuplicateKey { ref key } if key == "a.bin"), "{err}");
        assert_eq!(store.len(), 3);
        assert_eq!(ctx.names_issued(), 3);
        assert_eq!(ctx.snapshot().get("a.bin").unwrap(), first.chunks.as_slice());
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let ctx = RunContext::with_prefix("T");
        let store = MemoryChunkStore::new();
        let chunker = FileChunker::new(&ctx, &store, options(100));

        let err = chunker
            .chunk_file(Path::new("/definitely/not/here.bin"), "here.bin", 10)
            .unwrap_err();
        assert!(matches!(err, ChunkCdnError::SourceUnreadable { .. }));
    }

    #[test]
    fn test_store_failure_is_chunk_write_error() {
        struct FullStore;
        impl ChunkStore for FullStore {
            fn put(&self, _name: &str, _bytes: &[u8]) -> std::io::Result<()> {
                Err(std::io::Error::new(ErrorKind::Other, "disk full"))
            }
        }

        let ctx = RunContext::with_prefix("T");
        let chunker = FileChunker::new(&ctx, &FullStore, options(100));
        let err = chunker
            .chunk_stream(Cursor::new(vec![0u8; 10]), Path::new("a"), "a", 10)
            .unwrap_err();
        assert!(matches!(err, ChunkCdnError::ChunkWrite { ref name, .. } if name == "T00000000"));
    }
}
