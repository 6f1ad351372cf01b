#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use imagegate_core::HandlerConfig;
use std::sync::Arc;

/// Create a storage backend based on configuration
pub async fn create_storage(config: &HandlerConfig) -> StorageResult<Arc<dyn Storage>> {
    let max_bytes = config.max_source_bytes as u64;

    match config.storage_backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let storage = S3Storage::new(
                &config.source_buckets,
                config.aws_region.clone(),
                config.s3_endpoint.clone(),
            )?
            .with_max_object_bytes(max_bytes);
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_storage_path.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;

            let storage = LocalStorage::new(base_path)
                .await?
                .with_max_object_bytes(max_bytes);
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_backend_from_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = HandlerConfig {
            source_buckets: vec!["images".to_string()],
            storage_backend: StorageBackend::Local,
            local_storage_path: Some(dir.path().display().to_string()),
            ..Default::default()
        };
        let storage = create_storage(&config).await.unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Local);
    }

    #[tokio::test]
    async fn test_local_backend_requires_path() {
        let config = HandlerConfig {
            source_buckets: vec!["images".to_string()],
            storage_backend: StorageBackend::Local,
            ..Default::default()
        };
        assert!(matches!(
            create_storage(&config).await,
            Err(StorageError::ConfigError(_))
        ));
    }
}
