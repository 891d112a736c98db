use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use chunkcdn_common::ResolvedChunk;
use log::debug;

use crate::error::ServeError;
use crate::reconstructor::Reconstructor;

fn request_host(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|host| !host.is_empty())
        .map(str::to_string)
}

/// `path` is the request path including its leading `/`.
async fn lookup(
    reconstructor: Arc<Reconstructor>,
    path: String,
    headers: &HeaderMap,
) -> Result<Json<Vec<ResolvedChunk>>, ServeError> {
    let host = request_host(headers);
    // The first request may have to read the manifest from disk.
    let chunks = tokio::task::spawn_blocking(move || reconstructor.lookup(&path, host.as_deref()))
        .await
        .map_err(|e| ServeError::Internal {
            message: e.to_string(),
        })??;
    debug!("resolved {} chunks", chunks.len());
    Ok(Json(chunks))
}

pub(crate) async fn lookup_root(
    State(reconstructor): State<Arc<Reconstructor>>,
    headers: HeaderMap,
) -> Result<Json<Vec<ResolvedChunk>>, ServeError> {
    lookup(reconstructor, "/".to_string(), &headers).await
}

pub(crate) async fn lookup_key(
    State(reconstructor): State<Arc<Reconstructor>>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<ResolvedChunk>>, ServeError> {
    // The wildcard capture drops the path's first `/`; restore it so that
    // `//name` still counts two separators.
    lookup(reconstructor, format!("/{key}"), &headers).await
}
