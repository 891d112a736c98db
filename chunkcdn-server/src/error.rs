//! HTTP mapping of reconstructor failures.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chunkcdn_common::ChunkCdnError;
use log::{error, warn};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error(transparent)]
    Lookup(#[from] ChunkCdnError),

    /// The lookup task did not complete.
    #[error("internal error: {message}")]
    Internal { message: String },
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl ServeError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Lookup(e) if e.is_bad_request() => StatusCode::BAD_REQUEST,
            Self::Lookup(e) if e.is_not_ready() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self.status_code() {
            StatusCode::BAD_REQUEST => "bad_request",
            StatusCode::SERVICE_UNAVAILABLE => "not_ready",
            _ => "internal",
        }
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{self}");
        } else {
            warn!("{self}");
        }
        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
