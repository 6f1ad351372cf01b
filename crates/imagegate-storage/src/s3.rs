use crate::traits::{Storage, StorageError, StorageResult, StoredObject};
use crate::StorageBackend;
use async_trait::async_trait;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{Attribute, ObjectStoreExt, Result as ObjectResult};
use std::collections::HashMap;

/// S3 storage implementation
///
/// Holds one client per allow-listed bucket.
#[derive(Clone)]
pub struct S3Storage {
    stores: HashMap<String, AmazonS3>,
    max_object_bytes: Option<u64>,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `buckets` - S3 buckets the handler may read from
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub fn new(
        buckets: &[String],
        region: Option<String>,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut stores = HashMap::with_capacity(buckets.len());

        for bucket in buckets {
            // Build AmazonS3 object store from environment and explicit settings.
            let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket.clone());

            if let Some(ref region) = region {
                builder = builder.with_region(region.clone());
            }

            if let Some(ref endpoint) = endpoint_url {
                let allow_http = endpoint.starts_with("http://");
                builder = builder
                    .with_endpoint(endpoint.clone())
                    .with_allow_http(allow_http);
            }

            let store = builder
                .build()
                .map_err(|e| StorageError::ConfigError(e.to_string()))?;
            stores.insert(bucket.clone(), store);
        }

        Ok(S3Storage {
            stores,
            max_object_bytes: None,
        })
    }

    /// Reject objects larger than `limit` bytes before downloading their body.
    pub fn with_max_object_bytes(mut self, limit: u64) -> Self {
        self.max_object_bytes = Some(limit);
        self
    }

    fn store(&self, bucket: &str) -> StorageResult<&AmazonS3> {
        self.stores
            .get(bucket)
            .ok_or_else(|| StorageError::AccessDenied(format!("Bucket '{}' is not configured", bucket)))
    }
}

fn map_error(e: ObjectStoreError, bucket: &str, key: &str) -> StorageError {
    match e {
        ObjectStoreError::NotFound { .. } => StorageError::NotFound(format!("{}/{}", bucket, key)),
        ObjectStoreError::PermissionDenied { .. } | ObjectStoreError::Unauthenticated { .. } => {
            StorageError::AccessDenied(format!("{}/{}", bucket, key))
        }
        other => StorageError::BackendError(other.to_string()),
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<StoredObject> {
        let store = self.store(bucket)?;
        let start = std::time::Instant::now();
        let location = Path::from(key.to_string());

        let result: ObjectResult<_> = store.get(&location).await;

        let result = result.map_err(|e| {
            let mapped = map_error(e, bucket, key);
            if matches!(mapped, StorageError::BackendError(_)) {
                tracing::error!(
                    error = %mapped,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 get failed"
                );
            }
            mapped
        })?;

        let size = result.meta.size as u64;
        if let Some(limit) = self.max_object_bytes {
            if size > limit {
                return Err(StorageError::TooLarge { size, limit });
            }
        }

        let last_modified = result.meta.last_modified;
        let content_type = result
            .attributes
            .get(&Attribute::ContentType)
            .map(|v| v.to_string());
        let cache_control = result
            .attributes
            .get(&Attribute::CacheControl)
            .map(|v| v.to_string());

        let data = result
            .bytes()
            .await
            .map_err(|e| map_error(e, bucket, key))?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 get successful"
        );

        Ok(StoredObject {
            data,
            content_type,
            cache_control,
            expires: None,
            last_modified: Some(last_modified),
        })
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_bucket_is_denied() {
        let storage = S3Storage::new(
            &["images".to_string()],
            Some("us-east-1".to_string()),
            Some("http://localhost:9000".to_string()),
        )
        .unwrap();
        assert!(storage.store("images").is_ok());
        assert!(matches!(
            storage.store("private"),
            Err(StorageError::AccessDenied(_))
        ));
    }

    #[test]
    fn test_error_mapping() {
        let not_found = ObjectStoreError::NotFound {
            path: "cat.png".to_string(),
            source: "missing".into(),
        };
        assert!(matches!(
            map_error(not_found, "images", "cat.png"),
            StorageError::NotFound(_)
        ));

        let denied = ObjectStoreError::PermissionDenied {
            path: "cat.png".to_string(),
            source: "forbidden".into(),
        };
        assert!(matches!(
            map_error(denied, "images", "cat.png"),
            StorageError::AccessDenied(_)
        ));
    }
}
