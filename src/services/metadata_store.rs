//! Persistence of [`FileRecord`]s.

use crate::models::file_record::FileRecord;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("a record for key `{0}` already exists")]
    DuplicateKey(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataRecorder: Send + Sync {
    async fn save(&self, record: &FileRecord) -> Result<(), MetadataError>;
}

/// Metadata recorder backed by the `files` table.
#[derive(Clone)]
pub struct SqliteFileRepository {
    db: Arc<SqlitePool>,
}

impl SqliteFileRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Look up a record by its storage key.
    pub async fn find_by_key(&self, file_key: &str) -> Result<Option<FileRecord>, MetadataError> {
        let record = sqlx::query_as::<_, FileRecord>(
            "SELECT id, name, file_size, file_type, file_key, url, create_by,
                    owner_id, user_enums, file_directory_id, created_at
             FROM files WHERE file_key = ?",
        )
        .bind(file_key)
        .fetch_optional(&*self.db)
        .await?;
        Ok(record)
    }
}

#[async_trait]
impl MetadataRecorder for SqliteFileRepository {
    async fn save(&self, record: &FileRecord) -> Result<(), MetadataError> {
        sqlx::query(
            "INSERT INTO files (
                id, name, file_size, file_type, file_key, url, create_by,
                owner_id, user_enums, file_directory_id, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(record.file_size)
        .bind(&record.file_type)
        .bind(&record.file_key)
        .bind(&record.url)
        .bind(&record.create_by)
        .bind(&record.owner_id)
        .bind(&record.user_enums)
        .bind(&record.file_directory_id)
        .bind(record.created_at)
        .execute(&*self.db)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                MetadataError::DuplicateKey(record.file_key.clone())
            } else {
                MetadataError::Sqlx(err)
            }
        })?;
        Ok(())
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
