//! Key validation, manifest caching and chunk-location resolution.

use std::path::PathBuf;
use std::sync::Arc;

use chunkcdn_common::{read_manifest, ChunkCdnError, ChunkDescriptor, Manifest, ResolvedChunk, Result};
use log::{debug, info};
use once_cell::sync::OnceCell;

/// Answers "which chunks rebuild this file" from a manifest that is read at
/// most once per process.
#[derive(Debug)]
pub struct Reconstructor {
    manifest_path: PathBuf,
    base_location: Option<String>,
    /// Request hosts trusted as a base when no base location is configured.
    allowed_hosts: Vec<String>,
    namespace: String,
    cache: OnceCell<Arc<Manifest>>,
}

impl Reconstructor {
    pub fn new(manifest_path: impl Into<PathBuf>, base_location: Option<String>, namespace: impl Into<String>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            base_location,
            allowed_hosts: Vec::new(),
            namespace: namespace.into(),
            cache: OnceCell::new(),
        }
    }

    /// A reconstructor over an already decoded manifest.
    pub fn with_manifest(manifest: Manifest, base_location: Option<String>, namespace: impl Into<String>) -> Self {
        let this = Self::new(PathBuf::new(), base_location, namespace);
        // Fresh cell, cannot already be set.
        let _ = this.cache.set(Arc::new(manifest));
        this
    }

    pub fn with_allowed_hosts(mut self, hosts: impl IntoIterator<Item = String>) -> Self {
        self.allowed_hosts = hosts.into_iter().map(|h| h.to_ascii_lowercase()).collect();
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.cache.get().is_some()
    }

    /// The cached manifest, loading it on first use.
    ///
    /// Concurrent first callers block on the same load. A failed load leaves
    /// the cell empty, so the next caller tries again.
    pub fn manifest(&self) -> Result<Arc<Manifest>> {
        self.cache
            .get_or_try_init(|| {
                let manifest = read_manifest(&self.manifest_path)?;
                info!(
                    "loaded manifest {} ({} files, {} chunks)",
                    self.manifest_path.display(),
                    manifest.len(),
                    manifest.chunk_count()
                );
                Ok(Arc::new(manifest))
            })
            .cloned()
    }

    /// Load the manifest now rather than on the first request.
    pub fn load(&self) -> Result<()> {
        self.manifest().map(|_| ())
    }

    /// Base that chunk locations are resolved against.
    ///
    /// The configured base location wins. Otherwise `http://<host>` is used
    /// only for a request host on the allow-list, and locations stay
    /// root-relative for any other host.
    fn base_for(&self, request_host: Option<&str>) -> String {
        if let Some(base) = &self.base_location {
            return base.clone();
        }
        match request_host {
            Some(host) if self.allowed_hosts.iter().any(|h| h.eq_ignore_ascii_case(host)) => {
                format!("http://{host}")
            }
            Some(host) => {
                debug!("host {host:?} is not allowed, resolving root-relative");
                String::new()
            }
            None => String::new(),
        }
    }

    /// Resolve the chunks of `raw_key`. An unknown key yields an empty list.
    pub fn lookup(&self, raw_key: &str, request_host: Option<&str>) -> Result<Vec<ResolvedChunk>> {
        let key = validate_key(raw_key)?;
        let manifest = self.manifest()?;
        let base = self.base_for(request_host);

        let Some(chunks) = manifest.get(key) else {
            debug!("no chunks for {key}");
            return Ok(Vec::new());
        };
        Ok(resolve_chunks(chunks, &base, &self.namespace))
    }
}

/// Strip one leading `/` and reject keys that cannot name a top-level file.
pub fn validate_key(raw: &str) -> Result<&str> {
    let key = raw.strip_prefix('/').unwrap_or(raw);
    let reason = if key.is_empty() {
        "empty key"
    } else if key.contains('/') {
        "key must not contain '/'"
    } else if key == "." || key == ".." {
        "relative path component"
    } else {
        return Ok(key);
    };
    Err(ChunkCdnError::InvalidKey {
        key: raw.to_string(),
        reason,
    })
}

pub fn resolve_location(base: &str, namespace: &str, name: &str) -> String {
    format!(
        "{}/{}/{}",
        base.trim_end_matches('/'),
        namespace.trim_matches('/'),
        name
    )
}

pub fn resolve_chunks(chunks: &[ChunkDescriptor], base: &str, namespace: &str) -> Vec<ResolvedChunk> {
    chunks
        .iter()
        .map(|chunk| ResolvedChunk::new(resolve_location(base, namespace, &chunk.name), chunk))
        .collect()
}
