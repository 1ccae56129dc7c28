//! Transient request values. Nothing here is persisted as-is.

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use thiserror::Error;

const OCTET_STREAM: &str = "application/octet-stream";
const DECODED_FILE_STEM: &str = "tempfile";

/// A file part as received from the client, either multipart or decoded base64.
#[derive(Clone, Debug, PartialEq)]
pub struct FilePayload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl FilePayload {
    pub fn size(&self) -> i64 {
        self.bytes.len() as i64
    }
}

/// Everything the upload endpoint received for one request.
#[derive(Clone, Debug, Default)]
pub struct UploadRequest {
    pub file: Option<FilePayload>,
    /// Base64 payload; takes precedence over `file` when non-blank.
    pub base64: Option<String>,
    pub directory_path: String,
    pub token: Option<String>,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("data URI is missing the `,` separator")]
    MalformedDataUri,
    #[error("payload is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

impl FilePayload {
    /// Decode a base64 upload.
    ///
    /// Accepts either a data URI (`data:image/png;base64,iVBOR...`) or a bare
    /// base64 string. For data URIs the content type comes from the header and
    /// the filename is `tempfile.{subtype}`; bare strings are typed
    /// `application/octet-stream`.
    pub fn from_base64(raw: &str) -> Result<Self, DecodeError> {
        let raw = raw.trim();
        let (content_type, data) = if let Some(rest) = raw.strip_prefix("data:") {
            let (header, data) = rest.split_once(',').ok_or(DecodeError::MalformedDataUri)?;
            let mime = header.split(';').next().unwrap_or_default().trim();
            let mime = if mime.is_empty() { OCTET_STREAM } else { mime };
            (mime.to_string(), data)
        } else {
            (OCTET_STREAM.to_string(), raw)
        };

        let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = general_purpose::STANDARD.decode(compact)?;

        let filename = match content_type.split_once('/') {
            Some((_, subtype)) if content_type != OCTET_STREAM && !subtype.is_empty() => {
                format!("{}.{}", DECODED_FILE_STEM, subtype)
            }
            _ => DECODED_FILE_STEM.to_string(),
        };

        Ok(Self {
            filename,
            content_type: Some(content_type),
            bytes: Bytes::from(bytes),
        })
    }
}
