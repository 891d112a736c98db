//! Consumer-side reassembly: fetch resolved chunks in order, check their
//! sizes, decode and append them to an output stream.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::codec::decode_chunk;
use crate::error::{ChunkCdnError, Result};
use crate::meta::ResolvedChunk;

/// Something that can hand out the stored bytes behind a resolved location.
pub trait ChunkSource {
    fn fetch(&self, location: &str) -> std::io::Result<Vec<u8>>;
}

/// Serves locations from a local copy of the chunk directory. Only the last
/// path segment of a location is used, so both bare chunk names and full
/// URLs resolve.
pub struct DirChunkSource {
    root: PathBuf,
}

impl DirChunkSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ChunkSource for DirChunkSource {
    fn fetch(&self, location: &str) -> std::io::Result<Vec<u8>> {
        let name = location.rsplit('/').next().unwrap_or(location);
        if name.is_empty() || name == "." || name == ".." {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("no chunk name in location {location:?}"),
            ));
        }
        fs::read(self.root.join(name))
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReassemblyReport {
    pub chunks: u64,
    pub stored_bytes: u64,
    pub raw_bytes: u64,
}

pub fn reassemble<S, W>(chunks: &[ResolvedChunk], source: &S, out: &mut W) -> Result<ReassemblyReport>
where
    S: ChunkSource + ?Sized,
    W: Write,
{
    let mut report = ReassemblyReport::default();

    for chunk in chunks {
        let location = chunk.resolved_chunk_location.as_str();
        let stored = source.fetch(location).map_err(|e| ChunkCdnError::ChunkFetch {
            location: location.to_string(),
            source: e,
        })?;

        if stored.len() as u64 != chunk.compressed_length {
            return Err(ChunkCdnError::ChunkSizeMismatch {
                location: location.to_string(),
                expected: chunk.compressed_length,
                actual: stored.len() as u64,
            });
        }

        let raw = decode_chunk(chunk.encoding, stored, chunk.raw_length).map_err(|e| {
            ChunkCdnError::ChunkFetch {
                location: location.to_string(),
                source: e,
            }
        })?;

        if raw.len() as u64 != chunk.raw_length {
            return Err(ChunkCdnError::ChunkSizeMismatch {
                location: location.to_string(),
                expected: chunk.raw_length,
                actual: raw.len() as u64,
            });
        }

        out.write_all(&raw).map_err(|e| ChunkCdnError::ChunkWrite {
            name: location.to_string(),
            source: e,
        })?;

        log::debug!("[reassemble] {} -> {} bytes", location, raw.len());
        report.chunks += 1;
        report.stored_bytes += chunk.compressed_length;
        report.raw_bytes += chunk.raw_length;
    }

    out.flush().map_err(|e| ChunkCdnError::ChunkWrite {
        name: "<output>".to_string(),
        source: e,
    })?;
    Ok(report)
}
