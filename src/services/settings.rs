//! Settings lookup used to decide whether a storage provider is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::sync::Arc;
use thiserror::Error;

/// Setting key holding the storage provider configuration.
pub const OSS_SETTING: &str = "OSS_SETTING";

#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
pub struct Setting {
    pub id: String,
    pub setting_value: Option<String>,
}

impl Setting {
    /// A present-but-blank value counts as not configured.
    pub fn is_configured(&self) -> bool {
        self.setting_value
            .as_deref()
            .is_some_and(|v| !v.trim().is_empty())
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettingsLookup: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Setting>, SettingsError>;
}

/// Settings stored in the `settings` table.
#[derive(Clone)]
pub struct SqliteSettings {
    db: Arc<SqlitePool>,
}

impl SqliteSettings {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Insert or replace a setting value.
    pub async fn put(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        sqlx::query(
            "INSERT INTO settings (id, setting_value) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET setting_value = excluded.setting_value",
        )
        .bind(key)
        .bind(value)
        .execute(&*self.db)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SettingsLookup for SqliteSettings {
    async fn get(&self, key: &str) -> Result<Option<Setting>, SettingsError> {
        let setting = sqlx::query_as::<_, Setting>(
            "SELECT id, setting_value FROM settings WHERE id = ?",
        )
        .bind(key)
        .fetch_optional(&*self.db)
        .await?;
        Ok(setting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn missing_then_present() {
        let pool = db::memory_pool().await;
        let settings = SqliteSettings::new(pool);

        assert_eq!(settings.get(OSS_SETTING).await.unwrap(), None);

        settings.put(OSS_SETTING, r#"{"type":"LOCAL"}"#).await.unwrap();
        let found = settings.get(OSS_SETTING).await.unwrap().unwrap();
        assert!(found.is_configured());

        settings.put(OSS_SETTING, " ").await.unwrap();
        let found = settings.get(OSS_SETTING).await.unwrap().unwrap();
        assert!(!found.is_configured());
    }
}
