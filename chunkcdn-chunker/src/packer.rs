// chunkcdn-chunker/src/packer.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chunkcdn_common::common_config::StrategicConfig;
use chunkcdn_common::{write_manifest, ChunkingReport, FileFailure, FileMeta};
use crossbeam_channel::unbounded;
use log::{debug, error, info};
use rayon::ThreadPoolBuilder;

use crate::chunker::{ChunkOptions, FileChunker};
use crate::context::RunContext;
use crate::routes::{write_routes, RouteOptions, DEFAULT_ROUTES_FILE_NAME};
use crate::store::DirChunkStore;
use crate::walker::collect_sources;

/// Where a run put its artifacts.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub chunk_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub routes_path: PathBuf,
}

impl RunOutput {
    pub fn new(output_dir: &Path, config: &StrategicConfig) -> Self {
        Self {
            chunk_dir: output_dir.join(config.chunk_namespace.trim_matches('/')),
            manifest_path: output_dir.join(config.manifest_file()),
            routes_path: output_dir.join(DEFAULT_ROUTES_FILE_NAME),
        }
    }
}

/// Chunk every file below `input_dir` into `output_dir`.
///
/// `<output_dir>/<namespace>` is recreated from scratch. A file that fails
/// to chunk is recorded in the report and the run continues with the next
/// one; the manifest only lists files that were chunked completely.
pub fn chunk_dir(
    input_dir: &Path,
    output_dir: &Path,
    config: &StrategicConfig,
    routes: &RouteOptions,
) -> Result<ChunkingReport> {
    config.validate()?;
    if !input_dir.is_dir() {
        bail!("{} is not a directory", input_dir.display());
    }
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;
    let input_canon = input_dir.canonicalize()?;
    let output_canon = output_dir.canonicalize()?;
    if input_canon == output_canon {
        bail!("input and output directory cannot be the same path");
    }

    let out = RunOutput::new(output_dir, config);
    // The chunk directory is wiped below; it must not hold the input.
    let chunk_canon = RunOutput::new(&output_canon, config).chunk_dir;
    if input_canon.starts_with(&chunk_canon) {
        bail!(
            "input directory {} lies inside the chunk directory {}",
            input_dir.display(),
            out.chunk_dir.display()
        );
    }
    if out.chunk_dir.is_dir() {
        fs::remove_dir_all(&out.chunk_dir)
            .with_context(|| format!("clearing {}", out.chunk_dir.display()))?;
    }
    fs::create_dir_all(&out.chunk_dir)
        .with_context(|| format!("creating {}", out.chunk_dir.display()))?;
    debug!("mkdir {}", out.chunk_dir.display());

    info!("reading files from {}", input_dir.display());
    let sources = collect_sources(input_dir, Some(output_dir))?;
    info!(
        "{} files to chunk, {} entries skipped, {} workers",
        sources.files.len(),
        sources.skipped,
        config.max_workers
    );

    let ctx = RunContext::new();
    let store = DirChunkStore::new(&out.chunk_dir);
    let chunker = FileChunker::new(&ctx, &store, ChunkOptions::from(config));

    let pool = ThreadPoolBuilder::new()
        .num_threads(config.max_workers)
        .build()?;
    let (tx_done, rx_done) = unbounded::<(String, chunkcdn_common::Result<FileMeta>)>();

    pool.scope(|s| {
        for source in &sources.files {
            let tx_done = tx_done.clone();
            let chunker = &chunker;
            s.spawn(move |_| {
                debug!("[worker] chunking {} ({} bytes)", source.path.display(), source.length);
                let result = chunker.chunk_file(&source.path, &source.key, source.length);
                // The receiver outlives the scope.
                let _ = tx_done.send((source.key.clone(), result));
            });
        }
    });
    drop(tx_done);

    let mut report = ChunkingReport {
        total_files: sources.files.len() as u64,
        skipped_entries: sources.skipped,
        ..ChunkingReport::default()
    };
    for (key, result) in rx_done.iter() {
        match result {
            Ok(meta) => report.add_file(&meta),
            Err(e) => {
                error!("error in chunking {key}: {e}");
                report.failures.push(FileFailure { key, error: e });
            }
        }
    }
    report.failures.sort_by(|a, b| a.key.cmp(&b.key));

    let manifest = ctx.into_manifest();
    let manifest_level = config.compress_manifest.then_some(config.compression_level);
    write_manifest(&out.manifest_path, &manifest, manifest_level)?;
    write_routes(&out.routes_path, &manifest, &config.chunk_namespace, routes)?;

    Ok(report)
}
