use crate::{
    services::{metadata_store::SqliteFileRepository, upload_service::UploadService},
    storage::local::LocalDiskBackend,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub uploads: UploadService,
    pub files: SqliteFileRepository,
    /// Serves the objects the local backend wrote.
    pub local: LocalDiskBackend,
    pub db: Arc<SqlitePool>,
}
