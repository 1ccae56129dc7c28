//! Token → caller resolution.
//!
//! The session mechanism itself lives elsewhere; this service only reads the
//! `access_tokens` table it maintains.

use crate::models::caller::{AuthenticatedCaller, Role};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthResolver: Send + Sync {
    /// `Ok(None)` means the token is unknown or expired.
    async fn resolve(&self, token: &str) -> Result<Option<AuthenticatedCaller>, AuthError>;
}

#[derive(FromRow, Debug)]
struct TokenRow {
    user_id: String,
    username: String,
    role: String,
    store_id: Option<String>,
}

#[derive(Clone)]
pub struct SqliteAuthResolver {
    db: Arc<SqlitePool>,
}

impl SqliteAuthResolver {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    #[cfg(test)]
    pub async fn issue(
        &self,
        token: &str,
        caller: &AuthenticatedCaller,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO access_tokens (token, user_id, username, role, store_id, expires_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(token)
        .bind(&caller.id)
        .bind(&caller.username)
        .bind(caller.role.as_str())
        .bind(&caller.store_id)
        .bind(expires_at)
        .execute(&*self.db)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AuthResolver for SqliteAuthResolver {
    async fn resolve(&self, token: &str) -> Result<Option<AuthenticatedCaller>, AuthError> {
        let now: DateTime<Utc> = Utc::now();
        let row = sqlx::query_as::<_, TokenRow>(
            "SELECT user_id, username, role, store_id FROM access_tokens
             WHERE token = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&*self.db)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        match row.role.parse::<Role>() {
            Ok(role) => Ok(Some(AuthenticatedCaller {
                id: row.user_id,
                username: row.username,
                role,
                store_id: row.store_id,
            })),
            Err(err) => {
                warn!(user_id = %row.user_id, error = %err, "token bound to unknown role");
                Ok(None)
            }
        }
    }
}
