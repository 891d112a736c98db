// chunkcdn-cli/src/main.rs

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;

use chunkcdn_chunker::{chunk_dir, write_routes, RouteOptions, RunOutput};
use chunkcdn_common::common_config::{DEFAULT_CHUNK_NAMESPACE, CONFIG};
use chunkcdn_common::{read_manifest, reassemble, DirChunkSource, ResolvedChunk};

#[derive(Parser)]
#[command(name = "chunkcdn")]
#[command(about = "Split large files into CDN-sized chunks and put them back together", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk every file of a directory and write the manifest
    Chunk(ChunkArgs),

    /// List the files and chunks of a manifest
    List {
        #[arg(short, long)]
        manifest: PathBuf,
    },

    /// Write the routing config for a manifest
    Routes {
        #[arg(short, long)]
        manifest: PathBuf,

        #[arg(short, long, default_value = "app.yaml")]
        output: PathBuf,

        #[arg(long, default_value = DEFAULT_CHUNK_NAMESPACE)]
        namespace: String,

        #[arg(long)]
        app_name: Option<String>,
    },

    /// Rebuild one file from its chunks
    Reassemble {
        #[arg(short, long)]
        manifest: PathBuf,

        /// Directory holding the chunk files
        #[arg(short, long)]
        chunk_dir: PathBuf,

        #[arg(short, long)]
        key: String,

        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Args)]
struct ChunkArgs {
    #[arg(short, long)]
    input: PathBuf,

    #[arg(short, long)]
    output: PathBuf,

    /// Largest number of source bytes per chunk
    #[arg(long)]
    max_chunk_payload: Option<u64>,

    /// zstd level, defaults to the maximum
    #[arg(long)]
    level: Option<i32>,

    #[arg(short, long)]
    jobs: Option<usize>,

    /// Also try to compress files that are already compressed
    #[arg(long)]
    no_skip: bool,

    #[arg(long)]
    compress_manifest: bool,

    /// Application name written to app.yaml
    #[arg(long)]
    app_name: Option<String>,
}

fn route_options(app_name: Option<String>) -> RouteOptions {
    RouteOptions {
        application: app_name,
        ..RouteOptions::default()
    }
}

fn run_chunk(args: ChunkArgs) -> Result<()> {
    let mut config = CONFIG.clone().with_env_overrides()?;
    if let Some(payload) = args.max_chunk_payload {
        config.max_chunk_payload = payload;
        config.max_workers = config.workers_for_memory(config.max_workers);
    }
    if let Some(level) = args.level {
        config.compression_level = level;
    }
    if let Some(jobs) = args.jobs {
        config.max_workers = jobs;
    }
    config.skip_precompressed = !args.no_skip;
    config.compress_manifest = args.compress_manifest;

    let report = chunk_dir(&args.input, &args.output, &config, &route_options(args.app_name))?;
    let out = RunOutput::new(&args.output, &config);

    println!("\nChunking done:");
    println!("  files found:        {}", report.total_files);
    println!("  files chunked:      {}", report.chunked_files);
    println!("  entries skipped:    {}", report.skipped_entries);
    println!("  chunks written:     {}", report.chunks);
    println!("  chunks compressed:  {}", report.compressed_chunks);
    println!("  chunks stored raw:  {}", report.raw_chunks);
    println!("  bytes read:         {}", report.total_bytes_in);
    println!("  bytes written:      {}", report.total_bytes_out);
    println!("  stored/source:      {:.2}%", report.compression_ratio());
    println!("  manifest:           {}", out.manifest_path.display());
    println!("  routes:             {}", out.routes_path.display());

    if !report.failures.is_empty() {
        eprintln!("\n{} files failed:", report.failures.len());
        for failure in &report.failures {
            eprintln!("  {}: {}", failure.key, failure.error);
        }
        bail!("{} of {} files could not be chunked", report.failures.len(), report.total_files);
    }
    Ok(())
}

fn run_list(manifest_path: &Path) -> Result<()> {
    let manifest = read_manifest(manifest_path)?;
    for (key, chunks) in manifest.iter() {
        let raw: u64 = chunks.iter().map(|c| c.raw_length).sum();
        let stored: u64 = chunks.iter().map(|c| c.compressed_length).sum();
        println!("{key}\t{} chunks\t{raw} bytes\t{stored} stored", chunks.len());
        for chunk in chunks {
            println!(
                "  {}\t{}\t{}\t{:?}",
                chunk.name, chunk.raw_length, chunk.compressed_length, chunk.encoding
            );
        }
    }
    println!("{} files, {} chunks", manifest.len(), manifest.chunk_count());
    Ok(())
}

fn run_reassemble(manifest_path: &Path, chunk_dir: &Path, key: &str, output: &Path) -> Result<()> {
    let manifest = read_manifest(manifest_path)?;
    let Some(chunks) = manifest.get(key) else {
        bail!("{key} is not in {}", manifest_path.display());
    };
    let resolved: Vec<ResolvedChunk> = chunks
        .iter()
        .map(|c| ResolvedChunk::new(format!("{}/{}", chunk_dir.display(), c.name), c))
        .collect();

    let file = File::create(output).with_context(|| format!("creating {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    let report = reassemble(&resolved, &DirChunkSource::new(chunk_dir), &mut writer)?;
    writer.flush()?;

    info!(
        "rebuilt {key} from {} chunks ({} stored bytes, {} bytes)",
        report.chunks, report.stored_bytes, report.raw_bytes
    );
    println!("{} -> {} ({} bytes)", key, output.display(), report.raw_bytes);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Chunk(args) => run_chunk(args)?,

        Commands::List { manifest } => run_list(&manifest)?,

        Commands::Routes {
            manifest,
            output,
            namespace,
            app_name,
        } => {
            let parsed = read_manifest(&manifest)?;
            write_routes(&output, &parsed, &namespace, &route_options(app_name))?;
            println!("routes for {} files -> {}", parsed.len(), output.display());
        }

        Commands::Reassemble {
            manifest,
            chunk_dir,
            key,
            output,
        } => run_reassemble(&manifest, &chunk_dir, &key, &output)?,
    }

    Ok(())
}
