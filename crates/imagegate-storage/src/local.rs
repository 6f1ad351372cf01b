use crate::traits::{Storage, StorageError, StorageResult, StoredObject};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local filesystem storage implementation
///
/// Objects live at `<base_path>/<bucket>/<key>`.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    max_object_bytes: Option<u64>,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory holding one directory per bucket
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            max_object_bytes: None,
        })
    }

    /// Reject objects larger than `limit` bytes before reading them.
    pub fn with_max_object_bytes(mut self, limit: u64) -> Self {
        self.max_object_bytes = Some(limit);
        self
    }

    /// Convert bucket and key to a filesystem path with security validation
    ///
    /// Neither part may contain traversal sequences that could escape the
    /// base storage directory.
    fn object_path(&self, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        if bucket.is_empty() || bucket.contains('/') || bucket.contains('\\') || bucket.contains("..") {
            return Err(StorageError::InvalidKey(format!(
                "Bucket name '{}' is not valid",
                bucket
            )));
        }
        if key.is_empty() || key.contains("..") || key.starts_with('/') || key.contains('\\') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        let path = self.base_path.join(bucket).join(key);

        let base_canonical = self.base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        if let Ok(canonical) = path.canonicalize() {
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(path)
    }
}

/// Guess a content type from the file extension.
fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let content_type = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "avif" => "image/avif",
        "tif" | "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        _ => return None,
    };
    Some(content_type)
}

fn map_io_error(e: std::io::Error, bucket: &str, key: &str) -> StorageError {
    match e.kind() {
        ErrorKind::NotFound => StorageError::NotFound(format!("{}/{}", bucket, key)),
        ErrorKind::PermissionDenied => StorageError::AccessDenied(format!("{}/{}", bucket, key)),
        _ => StorageError::IoError(e),
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<StoredObject> {
        let path = self.object_path(bucket, key)?;
        let start = std::time::Instant::now();

        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| map_io_error(e, bucket, key))?;
        if !metadata.is_file() {
            return Err(StorageError::NotFound(format!("{}/{}", bucket, key)));
        }

        if let Some(limit) = self.max_object_bytes {
            if metadata.len() > limit {
                return Err(StorageError::TooLarge {
                    size: metadata.len(),
                    limit,
                });
            }
        }

        let data = fs::read(&path)
            .await
            .map_err(|e| map_io_error(e, bucket, key))?;

        tracing::debug!(
            bucket = %bucket,
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local read successful"
        );

        Ok(StoredObject {
            data: Bytes::from(data),
            content_type: content_type_for(&path).map(str::to_string),
            cache_control: None,
            expires: None,
            last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
