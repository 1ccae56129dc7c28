//! Data models for the media upload service.
//!
//! Callers and upload requests are transient per-request values; file records
//! map to the `files` table via `sqlx::FromRow` and serialize via `serde`.

pub mod caller;
pub mod envelope;
pub mod file_record;
pub mod upload;
