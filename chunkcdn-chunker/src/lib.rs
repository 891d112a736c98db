//! Producer side of chunkcdn: splits files into bounded, compressed chunks,
//! stores them write-once and records them in a manifest.

pub mod chunker;
pub mod context;
pub mod packer;
pub mod routes;
pub mod store;
pub mod walker;

pub use chunker::{chunk_count, chunk_lengths, ChunkOptions, FileChunker};
pub use context::RunContext;
pub use packer::{chunk_dir, RunOutput};
pub use routes::{build_routes, render_routes, write_routes, RouteConfig, RouteOptions};
pub use store::{ChunkStore, DirChunkStore, MemoryChunkStore};
pub use walker::{collect_sources, SourceFile, WalkOutcome};
