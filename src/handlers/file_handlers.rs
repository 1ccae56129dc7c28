//! `GET /files/{*key}`: streams objects written by the local disk backend, so
//! the URLs it hands out resolve.

use crate::{errors::AppError, state::AppState};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use std::io;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

const OCTET_STREAM: &str = "application/octet-stream";

pub async fn get_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let path = state
        .local
        .object_path(&key)
        .map_err(|_| AppError::not_found(format!("file `{}` not found", key)))?;

    let file = File::open(&path).await.map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            AppError::not_found(format!("file `{}` not found", key))
        } else {
            tracing::error!(key = %key, error = %err, "failed to open stored file");
            AppError::internal("could not read file")
        }
    })?;
    let length = file.metadata().await.map(|m| m.len()).ok();

    // Objects without a record (partial failures) are still served, untyped.
    let declared = match state.files.find_by_key(&key).await {
        Ok(Some(record)) => Some(record.file_type),
        Ok(None) => None,
        Err(err) => {
            tracing::warn!(key = %key, error = %err, "metadata lookup failed while serving file");
            None
        }
    };

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, served_content_type(declared.as_deref()));
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    if let Some(len) = length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }
    Ok(response)
}

/// The upload gate only checks that the declared type mentions a media kind,
/// so anything that is not a plain `image/*` or `video/*` type is served as
/// opaque bytes. SVG is scriptable and is never echoed.
fn served_content_type(declared: Option<&str>) -> HeaderValue {
    declared
        .map(str::trim)
        .filter(|ct| {
            let lowered = ct.to_ascii_lowercase();
            (lowered.starts_with("image/") || lowered.starts_with("video/"))
                && !lowered.contains("svg")
        })
        .filter(|ct| !ct.contains(';') && !ct.contains(','))
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static(OCTET_STREAM))
}
