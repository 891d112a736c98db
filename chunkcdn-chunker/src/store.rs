//! Chunk object storage. Objects are addressed by name and written once.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use chunkcdn_common::ChunkSource;
use parking_lot::Mutex;

/// Write-once storage for chunk objects.
///
/// `put` must fail rather than overwrite an existing name.
pub trait ChunkStore: Send + Sync {
    fn put(&self, name: &str, bytes: &[u8]) -> io::Result<()>;
}

/// Stores each chunk as one file named after the chunk inside `root`.
pub struct DirChunkStore {
    root: PathBuf,
}

impl DirChunkStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ChunkStore for DirChunkStore {
    fn put(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self.root.join(name);
        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        file.write_all(bytes)?;
        file.flush()?;

        let stored = fs::metadata(&path)?.len();
        if stored != bytes.len() as u64 {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("{} holds {} bytes, wrote {}", path.display(), stored, bytes.len()),
            ));
        }
        Ok(())
    }
}

/// In-memory store, used by tests and dry runs.
#[derive(Default)]
pub struct MemoryChunkStore {
    chunks: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.chunks.lock().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.chunks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.lock().is_empty()
    }
}

impl ChunkStore for MemoryChunkStore {
    fn put(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        let mut chunks = self.chunks.lock();
        if chunks.contains_key(name) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("chunk {name} already stored"),
            ));
        }
        chunks.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }
}

impl ChunkSource for MemoryChunkStore {
    fn fetch(&self, location: &str) -> io::Result<Vec<u8>> {
        let name = location.rsplit('/').next().unwrap_or(location);
        self.get(name)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no chunk {name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_store_is_write_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirChunkStore::new(dir.path());

        store.put("C1", b"first").unwrap();
        let err = store.put("C1", b"second").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(dir.path().join("C1")).unwrap(), b"first");
    }

    #[test]
    fn test_dir_store_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirChunkStore::new(dir.path().join("absent"));
        assert!(store.put("C1", b"x").is_err());
    }

    #[test]
    fn test_memory_store_is_write_once() {
        let store = MemoryChunkStore::new();
        store.put("C1", b"a").unwrap();
        assert!(store.put("C1", b"b").is_err());
        assert_eq!(store.get("C1").unwrap(), b"a");
        assert_eq!(store.fetch("http://h/chunk/C1").unwrap(), b"a");
    }
}
