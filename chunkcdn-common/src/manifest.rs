//! Manifest model and codec.
//!
//! The manifest maps a file key (its `/`-separated path relative to the
//! chunked directory) to the ordered list of chunks that rebuild it:
//!
//! ```json
//! {
//!   "video.mp4": [
//!     { "name": "C65f0a1b2_00000001", "compressedLength": 29871033, "rawLength": 30000000, "encoding": "zstd" }
//!   ]
//! }
//! ```
//!
//! The encoded form may be wrapped in a single zstd frame as a whole;
//! [`decode_manifest`] recognises the frame magic and unwraps it.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ChunkCdnError, Result};
use crate::meta::ChunkDescriptor;

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    files: BTreeMap<String, Vec<ChunkDescriptor>>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the chunk list of `key`. Returns the previous list if the key
    /// was already present.
    pub fn insert(&mut self, key: impl Into<String>, chunks: Vec<ChunkDescriptor>) -> Option<Vec<ChunkDescriptor>> {
        self.files.insert(key.into(), chunks)
    }

    pub fn get(&self, key: &str) -> Option<&[ChunkDescriptor]> {
        self.files.get(key).map(Vec::as_slice)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.files.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ChunkDescriptor])> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Total number of chunks over all files.
    pub fn chunk_count(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }
}

pub fn encode_manifest(manifest: &Manifest) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(manifest)
        .map_err(|e| ChunkCdnError::ManifestEncode(e.to_string()))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Encode and wrap the JSON in one zstd frame.
pub fn encode_manifest_compressed(manifest: &Manifest, level: i32) -> Result<Vec<u8>> {
    let json = encode_manifest(manifest)?;
    zstd::encode_all(json.as_slice(), level).map_err(|e| ChunkCdnError::ManifestEncode(e.to_string()))
}

/// Decode a manifest, plain or zstd-wrapped. Empty input yields an empty manifest.
pub fn decode_manifest(bytes: &[u8]) -> Result<Manifest> {
    if bytes.starts_with(&ZSTD_MAGIC) {
        let json = zstd::decode_all(bytes).map_err(|e| ChunkCdnError::ManifestDecode(e.to_string()))?;
        return decode_json(&json);
    }
    decode_json(bytes)
}

fn decode_json(bytes: &[u8]) -> Result<Manifest> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Manifest::new());
    }
    serde_json::from_slice(bytes).map_err(|e| ChunkCdnError::ManifestDecode(e.to_string()))
}

pub fn write_manifest(path: &Path, manifest: &Manifest, compress_level: Option<i32>) -> Result<()> {
    let bytes = match compress_level {
        Some(level) => encode_manifest_compressed(manifest, level)?,
        None => encode_manifest(manifest)?,
    };
    fs::write(path, bytes)
        .map_err(|e| ChunkCdnError::ManifestEncode(format!("{}: {}", path.display(), e)))?;
    log::info!(
        "wrote manifest {} ({} files, {} chunks)",
        path.display(),
        manifest.len(),
        manifest.chunk_count()
    );
    Ok(())
}

pub fn read_manifest(path: &Path) -> Result<Manifest> {
    let bytes = fs::read(path).map_err(|e| ChunkCdnError::ManifestUnavailable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let manifest = decode_manifest(&bytes)?;
    log::info!(
        "parsed {} bytes of manifest into {} entries",
        bytes.len(),
        manifest.len()
    );
    Ok(manifest)
}
