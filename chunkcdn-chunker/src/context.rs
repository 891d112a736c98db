//! Run-scoped shared state: the chunk-name counter and the manifest being built.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chunkcdn_common::{ChunkDescriptor, Manifest};
use parking_lot::Mutex;

/// State shared by every worker of one chunking run.
///
/// Chunk names are `<prefix><counter>`; the counter only ever increases, so a
/// name handed out once is never handed out again within the run. The prefix
/// separates runs from each other so caches in front of the chunk store never
/// confuse a new chunk with an old one of the same counter value.
pub struct RunContext {
    prefix: String,
    next_id: AtomicU64,
    manifest: Mutex<Manifest>,
}

impl RunContext {
    /// Context whose prefix is derived from the current time.
    pub fn new() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self::with_prefix(format!("C{secs:x}_"))
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next_id: AtomicU64::new(0),
            manifest: Mutex::new(Manifest::new()),
        }
    }

    pub fn next_chunk_name(&self) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("{}{:08}", self.prefix, id)
    }

    /// Number of names handed out so far.
    pub fn names_issued(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }

    pub fn is_published(&self, key: &str) -> bool {
        self.manifest.lock().contains_key(key)
    }

    /// Publish the complete chunk list of one file. Returns `false` and leaves
    /// the manifest untouched if the key was already published.
    pub fn publish(&self, key: &str, chunks: Vec<ChunkDescriptor>) -> bool {
        let mut manifest = self.manifest.lock();
        if manifest.contains_key(key) {
            return false;
        }
        manifest.insert(key, chunks);
        true
    }

    pub fn snapshot(&self) -> Manifest {
        self.manifest.lock().clone()
    }

    pub fn into_manifest(self) -> Manifest {
        self.manifest.into_inner()
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
