use std::sync::Arc;

use anyhow::{Context, Result};
use chunkcdn_server::{ChunkServer, ServerConfig};
use clap::Parser;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let config = ServerConfig::parse();

    let reconstructor = Arc::new(config.reconstructor());
    if config.lazy {
        info!("manifest {} will be read on first request", config.manifest.display());
    } else {
        reconstructor
            .load()
            .with_context(|| format!("loading manifest {}", config.manifest.display()))?;
    }

    ChunkServer::new(reconstructor)
        .serve(config.listen)
        .await
        .with_context(|| format!("serving on {}", config.listen))
}
