//! HTTP front of the reconstructor.
//!
//! - `GET /{key}` returns the ordered chunk list of a top-level file as a JSON
//!   array of `{resolvedChunkLocation, compressedLength, rawLength, encoding}`.
//!   Unknown keys return `[]`.
//! - Malformed keys (empty, nested, `.`/`..`) return 400.
//! - 503 while the manifest cannot be loaded.

mod error;
mod handlers;
pub mod reconstructor;


use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use chunkcdn_common::common_config::{check_namespace, DEFAULT_CHUNK_NAMESPACE, DEFAULT_MANIFEST_FILE_NAME};
use clap::Parser;
use log::info;

pub use error::ServeError;
pub use reconstructor::{resolve_chunks, resolve_location, validate_key, Reconstructor};

#[derive(Debug, Clone, Parser)]
#[command(name = "chunkcdn-server")]
#[command(about = "Serve chunk lists for files split by chunkcdn", long_about = None)]
pub struct ServerConfig {
    /// Manifest written by `chunkcdn chunk`
    #[arg(short, long, env = "CHUNKCDN_MANIFEST", default_value = DEFAULT_MANIFEST_FILE_NAME)]
    pub manifest: PathBuf,

    #[arg(short, long, env = "CHUNKCDN_LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Base URL chunk locations are resolved against
    #[arg(long, env = "CHUNKCDN_BASE_URL")]
    pub base_url: Option<String>,

    /// Without a base URL, requests for these hosts resolve against
    /// `http://<Host>`; all others get root-relative locations
    #[arg(long = "allowed-host", env = "CHUNKCDN_ALLOWED_HOSTS", value_delimiter = ',')]
    pub allowed_hosts: Vec<String>,

    #[arg(long, env = "CHUNKCDN_NAMESPACE", default_value = DEFAULT_CHUNK_NAMESPACE, value_parser = parse_namespace)]
    pub namespace: String,

    /// Defer reading the manifest until the first request
    #[arg(long)]
    pub lazy: bool,
}

fn parse_namespace(value: &str) -> anyhow::Result<String> {
    check_namespace(value).map(str::to_string)
}

impl ServerConfig {
    pub fn reconstructor(&self) -> Reconstructor {
        Reconstructor::new(&self.manifest, self.base_url.clone(), &self.namespace)
            .with_allowed_hosts(self.allowed_hosts.iter().cloned())
    }
}

pub struct ChunkServer {
    router: Router,
}

impl ChunkServer {
    pub fn new(reconstructor: Arc<Reconstructor>) -> Self {
        let router = Router::new()
            .route("/", get(handlers::lookup_root))
            .route("/{*key}", get(handlers::lookup_key))
            .with_state(reconstructor);
        Self { router }
    }

    /// Return the inner [`Router`] (useful for testing with `tower::ServiceExt`).
    pub fn into_router(self) -> Router {
        self.router
    }

    pub async fn serve(self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("reconstructor listening on {addr}");
        axum::serve(listener, self.router).await
    }
}
