use std::cmp::{max, min};
use std::env;

use anyhow::{bail, Context};
use once_cell::sync::Lazy;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};

use crate::codec::max_compression_level;

/// Largest object the hosting target serves is 32 MB; keep 2 MB of headroom
/// for chunks that grow slightly when stored.
pub const DEFAULT_MAX_CHUNK_PAYLOAD: u64 = 30_000_000;

pub const DEFAULT_CHUNK_NAMESPACE: &str = "chunk";

pub const DEFAULT_MANIFEST_FILE_NAME: &str = "chunks.json";

#[derive(Debug, Clone)]
pub struct StrategicConfig {
    pub max_workers: usize,
    pub max_mem_allowed: u64,
    pub min_free_memory_ratio: f32,
    /// Upper bound on source bytes per chunk, before compression.
    pub max_chunk_payload: u64,
    pub compression_level: i32,
    pub chunk_namespace: String,
    pub manifest_file_name: String,
    /// Skip the compression attempt for file types that are already compressed.
    pub skip_precompressed: bool,
    pub compress_manifest: bool,
}

impl StrategicConfig {
    /// File name of the manifest as written by this configuration.
    pub fn manifest_file(&self) -> String {
        if self.compress_manifest {
            format!("{}.zst", self.manifest_file_name)
        } else {
            self.manifest_file_name.clone()
        }
    }

    /// Each worker holds one raw chunk and its compressed copy in memory.
    pub fn workers_for_memory(&self, cores: usize) -> usize {
        let per_worker = self.max_chunk_payload.saturating_mul(2).max(1);
        let by_memory = (self.max_mem_allowed / per_worker) as usize;
        max(1, min(cores, by_memory))
    }

    /// Apply `CHUNKCDN_*` environment overrides on top of this configuration.
    pub fn with_env_overrides(mut self) -> anyhow::Result<Self> {
        if let Ok(v) = env::var("CHUNKCDN_MAX_CHUNK_PAYLOAD") {
            self.max_chunk_payload = v
                .parse()
                .with_context(|| format!("CHUNKCDN_MAX_CHUNK_PAYLOAD={v}"))?;
        }
        if let Ok(v) = env::var("CHUNKCDN_COMPRESSION_LEVEL") {
            self.compression_level = v
                .parse()
                .with_context(|| format!("CHUNKCDN_COMPRESSION_LEVEL={v}"))?;
        }
        if let Ok(v) = env::var("CHUNKCDN_WORKERS") {
            self.max_workers = v.parse().with_context(|| format!("CHUNKCDN_WORKERS={v}"))?;
        }
        if let Ok(v) = env::var("CHUNKCDN_CHUNK_NAMESPACE") {
            self.chunk_namespace = v;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_chunk_payload == 0 {
            bail!("max_chunk_payload must be greater than zero");
        }
        if self.max_workers == 0 {
            bail!("max_workers must be greater than zero");
        }
        check_namespace(&self.chunk_namespace)?;
        Ok(())
    }
}

/// A chunk namespace must name one directory: a single path segment, with
/// surrounding `/` ignored.
pub fn check_namespace(namespace: &str) -> anyhow::Result<&str> {
    let ns = namespace.trim_matches('/');
    if ns.is_empty() || ns.contains('/') || ns == "." || ns == ".." {
        bail!("chunk namespace {namespace:?} must be a single path segment");
    }
    Ok(ns)
}

pub static CONFIG: Lazy<StrategicConfig> = Lazy::new(strategic_config);

fn strategic_config() -> StrategicConfig {
    let refresh = RefreshKind::nothing().with_memory(MemoryRefreshKind::everything());
    let mut sys = System::new_with_specifics(refresh);
    sys.refresh_memory();

    let total_memory = sys.total_memory();
    let cores = System::physical_core_count()
        .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
        .unwrap_or(1);

    let min_free_memory_ratio = 0.25;
    let max_mem_allowed = ((total_memory as f32) * (1.0 - min_free_memory_ratio)) as u64;

    let mut config = StrategicConfig {
        max_workers: 1,
        max_mem_allowed,
        min_free_memory_ratio,
        max_chunk_payload: DEFAULT_MAX_CHUNK_PAYLOAD,
        compression_level: max_compression_level(),
        chunk_namespace: DEFAULT_CHUNK_NAMESPACE.to_string(),
        manifest_file_name: DEFAULT_MANIFEST_FILE_NAME.to_string(),
        skip_precompressed: true,
        compress_manifest: false,
    };
    config.max_workers = config.workers_for_memory(cores);

    log::debug!(
        "[strategic_config] {} cores, {} MiB memory",
        cores,
        total_memory / (1024 * 1024)
    );
    log::debug!("[strategic_config] max_workers: {}", config.max_workers);
    log::debug!("[strategic_config] max_mem_allowed: {}", config.max_mem_allowed);
    log::debug!("[strategic_config] compression_level: {}", config.compression_level);

    config
}
