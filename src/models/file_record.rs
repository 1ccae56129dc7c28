//! Durable metadata describing one stored object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row of the `files` table.
///
/// Written exactly once after the backend accepted the bytes; never updated.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct FileRecord {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Original filename as submitted by the client.
    pub name: String,

    /// Size in bytes.
    pub file_size: i64,

    /// Declared content type (MIME type).
    pub file_type: String,

    /// Storage key the backend addressed the object by.
    pub file_key: String,

    /// URL returned by the backend.
    pub url: String,

    /// Username of the uploading caller.
    pub create_by: String,

    /// Caller id, or the store id for store accounts.
    pub owner_id: String,

    /// Role name of the uploading caller.
    pub user_enums: String,

    /// Last segment of the target directory path, if one was given.
    pub file_directory_id: Option<String>,

    pub created_at: DateTime<Utc>,
}
