//! HTTP surface of the upload service.
//!
//! - `POST /common/common/upload/file`: upload (multipart `file` or `base64`)
//! - `GET  /files/{*key}`: read back an object stored on local disk
//! - `GET  /healthz`, `GET /readyz`: probes

use crate::{
    handlers::{
        file_handlers::get_file,
        health_handlers::{healthz, readyz},
        upload_handlers::upload_file,
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build the router. `max_upload_bytes` caps the upload request body.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/common/common/upload/file",
            post(upload_file).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/files/{*key}", get(get_file))
}
