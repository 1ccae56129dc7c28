//! Storage backend capability.
//!
//! The upload pipeline only needs one operation from a backend: write a byte
//! stream under a key and hand back a URL that resolves to it. Concrete
//! backends are picked per deployment in `main`.

pub mod local;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::io;
use thiserror::Error;

/// Chunked object body handed to a backend.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage key `{0}`")]
    InvalidKey(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store `stream` under `key` and return its public URL.
    async fn upload(&self, stream: ByteStream, key: &str) -> StorageResult<String>;
}
