//! `POST /common/common/upload/file`: multipart or base64 media upload.
//!
//! Accepted multipart fields: `file` (binary part), `base64` (text, data URI or
//! bare base64), `directoryPath` (text). `base64` and `directoryPath` may also
//! be sent as query parameters, which win over form fields; a request without
//! a multipart body relies on them alone. The token comes from the
//! `accessToken` header or a bearer `Authorization` header.

use crate::{
    errors::AppError,
    models::{
        envelope::ResultMessage,
        upload::{FilePayload, UploadRequest},
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{
        Multipart, Query, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{HeaderMap, StatusCode, header},
};
use serde::Deserialize;

/// Header names are case-insensitive; clients usually send `accessToken`.
pub const ACCESS_TOKEN_HEADER: &str = "accesstoken";

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(rename = "directoryPath")]
    pub directory_path: Option<String>,
    pub base64: Option<String>,
}

pub async fn upload_file(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ResultMessage<String>>, AppError> {
    let mut request = UploadRequest {
        token: access_token(&headers),
        ..Default::default()
    };
    let mut form_directory = None;

    // Not a multipart body: the upload is carried by query parameters, and the
    // pipeline reports a missing file in the usual envelope.
    let mut multipart = match multipart {
        Ok(multipart) => Some(multipart),
        Err(rejection) => {
            tracing::debug!(reason = %rejection.body_text(), "upload without a multipart body");
            None
        }
    };

    while let Some(field) = match multipart.as_mut() {
        Some(multipart) => multipart.next_field().await.map_err(multipart_error)?,
        None => None,
    } {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                // Browsers send an empty part when no file was chosen.
                if !(filename.is_empty() && bytes.is_empty()) {
                    request.file = Some(FilePayload {
                        filename,
                        content_type,
                        bytes,
                    });
                }
            }
            "base64" => {
                let text = field.text().await.map_err(multipart_error)?;
                request.base64 = Some(text);
            }
            "directoryPath" => {
                let text = field.text().await.map_err(multipart_error)?;
                form_directory = Some(text);
            }
            other => tracing::debug!(field = %other, "ignoring unknown multipart field"),
        }
    }

    if query.base64.is_some() {
        request.base64 = query.base64;
    }
    request.directory_path = query
        .directory_path
        .or(form_directory)
        .unwrap_or_default();

    let url = state.uploads.handle(request).await?;
    Ok(Json(ResultMessage::data(url)))
}

/// Keeps the status multer assigned, so an oversized body is a 413.
fn multipart_error(err: MultipartError) -> AppError {
    let status = err.status();
    let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "FILE_TOO_LARGE"
    } else {
        "BAD_REQUEST"
    };
    AppError::new(status, code, err.body_text())
}

/// `accessToken` header first, then `Authorization: Bearer <token>`.
fn access_token(headers: &HeaderMap) -> Option<String> {
    let direct = headers
        .get(ACCESS_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let bearer = || {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(extract_bearer_token)
            .map(str::trim)
    };
    direct.or_else(bearer).map(str::to_string)
}

/// Extracts the bearer token from the Authorization header.
fn extract_bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
}
