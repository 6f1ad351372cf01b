//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Object is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// An object read from storage together with the metadata the response needs.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    /// Raw `Expires` value as stored with the object.
    pub expires: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl StoredObject {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            content_type: None,
            cache_control: None,
            expires: None,
            last_modified: None,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Storage abstraction trait
///
/// All storage backends (S3, local filesystem) must implement this trait.
/// The pipeline only ever reads, so the capability is a single `get`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Fetch an object and its metadata.
    ///
    /// Fails with `NotFound` when the object does not exist, `AccessDenied`
    /// when the backend refuses access, and `TooLarge` when the object exceeds
    /// the backend's size limit.
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<StoredObject>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
