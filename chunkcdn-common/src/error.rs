//! Error taxonomy shared by the chunker, the reconstructor and the reassembly client.

use std::path::PathBuf;

/// Result alias used across the chunkcdn crates.
pub type Result<T> = std::result::Result<T, ChunkCdnError>;

#[derive(Debug, thiserror::Error)]
pub enum ChunkCdnError {
    /// The source file could not be opened or a read failed midway.
    #[error("cannot read source {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The source ended before the length reported up front was consumed.
    #[error("short read on {path} chunk {chunk_index}: expected {expected} bytes, got {actual}")]
    ShortRead {
        path: PathBuf,
        chunk_index: u64,
        expected: u64,
        actual: u64,
    },

    #[error("cannot write chunk {name}: {source}")]
    ChunkWrite {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("compression failed for {path} chunk {chunk_index}: {message}")]
    Compression {
        path: PathBuf,
        chunk_index: u64,
        message: String,
    },

    /// A second source tried to publish under a key that is already in the manifest.
    #[error("key {key:?} is already in the manifest")]
    DuplicateKey { key: String },

    #[error("manifest encode failed: {0}")]
    ManifestEncode(String),

    #[error("manifest decode failed: {0}")]
    ManifestDecode(String),

    /// The request key is empty, nested or otherwise malformed.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// The manifest could not be loaded, so no request can be answered.
    #[error("manifest unavailable at {path}: {reason}")]
    ManifestUnavailable { path: PathBuf, reason: String },

    #[error("cannot fetch chunk {location}: {source}")]
    ChunkFetch {
        location: String,
        #[source]
        source: std::io::Error,
    },

    /// A fetched or decoded chunk did not have the length recorded in the manifest.
    #[error("chunk {location} is {actual} bytes, manifest says {expected}")]
    ChunkSizeMismatch {
        location: String,
        expected: u64,
        actual: u64,
    },
}

impl ChunkCdnError {
    /// True for errors caused by the caller's input rather than server state.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::InvalidKey { .. })
    }

    /// True when the manifest itself could not be produced for serving.
    pub fn is_not_ready(&self) -> bool {
        matches!(
            self,
            Self::ManifestUnavailable { .. } | Self::ManifestDecode(_)
        )
    }
}
