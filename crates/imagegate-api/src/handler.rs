//! Pipeline orchestrator
//!
//! [`ImageHandler::handle`] runs one inbound event through every stage: resolve,
//! compile, fetch, enrich, execute, respond. Each invocation is independent; the
//! handler only holds configuration and the injected capabilities.

use crate::response::{self, CacheMeta};
use bytes::Bytes;
use futures::future::try_join_all;
use imagegate_core::{
    EditPlanCompiler, HandlerConfig, ImageHandlerError, InboundEvent, RequestResolver,
    ResponseEnvelope, SourceFetchFailure,
};
use imagegate_detection::DetectionService;
use imagegate_processing::{
    Enricher, ImageProbe, OverlayAssets, SourceImage, TransformExecutor,
};
use imagegate_storage::{Storage, StorageError, StoredObject};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct ImageHandler {
    config: Arc<HandlerConfig>,
    resolver: RequestResolver,
    compiler: EditPlanCompiler,
    enricher: Enricher,
    executor: Arc<TransformExecutor>,
    storage: Arc<dyn Storage>,
    fetch_timeout: Duration,
}

impl ImageHandler {
    pub fn new(
        config: Arc<HandlerConfig>,
        storage: Arc<dyn Storage>,
        detection: Arc<dyn DetectionService>,
    ) -> Self {
        Self {
            resolver: RequestResolver::new(config.clone()),
            compiler: EditPlanCompiler::new(config.clone()),
            enricher: Enricher::new(&config, detection),
            executor: Arc::new(TransformExecutor::new(&config)),
            storage,
            fetch_timeout: Duration::from_millis(config.fetch_timeout_ms),
            config,
        }
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Handle one event. Failures are mapped into error envelopes, never returned.
    pub async fn handle(&self, event: &InboundEvent) -> ResponseEnvelope {
        let start = Instant::now();
        match self.process(event).await {
            Ok(envelope) => {
                tracing::info!(
                    path = %event.path,
                    status = envelope.status_code,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Image request served"
                );
                envelope
            }
            Err(err) => {
                response::log_error(&err, &self.config);
                response::build_error(&err, &self.config, event.front_door)
            }
        }
    }

    async fn process(&self, event: &InboundEvent) -> Result<ResponseEnvelope, ImageHandlerError> {
        let descriptor = self.resolver.resolve(event)?;
        let plan = self.compiler.compile(&descriptor)?;

        tracing::debug!(
            bucket = %descriptor.bucket,
            key = %descriptor.key,
            dialect = %descriptor.dialect,
            operations = ?plan.operation_names(),
            "Compiled edit plan"
        );

        let source = self.fetch(&descriptor.bucket, &descriptor.key).await?;

        let plan = if plan.needs_faces() || plan.needs_labels() {
            let info = ImageProbe::probe(&source.data)?;
            self.enricher
                .enrich(plan, &source.data, (info.width, info.height))
                .await?
        } else {
            plan
        };

        let overlays = self.fetch_overlays(&plan).await?;
        let custom_headers = plan.headers.clone();

        let executor = self.executor.clone();
        let source_image = SourceImage {
            bytes: source.data.clone(),
            content_type: source.content_type.clone(),
        };
        let output = tokio::task::spawn_blocking(move || {
            executor.execute(&plan, &source_image, &overlays)
        })
        .await
        .map_err(|e| ImageHandlerError::Internal(format!("Transform task failed: {}", e)))??;

        let cache = CacheMeta {
            cache_control: source
                .cache_control
                .clone()
                .unwrap_or_else(|| self.config.default_cache_control.clone()),
            expires: descriptor
                .expires
                .map(response::http_date)
                .or_else(|| source.expires.clone()),
            last_modified: source.last_modified.map(response::http_date),
        };

        Ok(response::build_success(
            &output.bytes,
            &output.content_type,
            &cache,
            &custom_headers,
            &self.config,
            event.front_door,
        ))
    }

    /// Fetch one object, bounded by the fetch timeout.
    async fn fetch(&self, bucket: &str, key: &str) -> Result<StoredObject, ImageHandlerError> {
        match tokio::time::timeout(self.fetch_timeout, self.storage.get(bucket, key)).await {
            Ok(Ok(object)) => {
                tracing::debug!(
                    bucket = %bucket,
                    key = %key,
                    size_bytes = object.size(),
                    "Fetched object"
                );
                Ok(object)
            }
            Ok(Err(e)) => Err(map_storage_error(e, bucket, key)),
            Err(_) => Err(ImageHandlerError::SourceFetch {
                failure: SourceFetchFailure::Timeout,
                bucket: bucket.to_string(),
                key: key.to_string(),
                detail: format!("no response after {} ms", self.fetch_timeout.as_millis()),
            }),
        }
    }

    /// Fetch every distinct overlay the plan references, concurrently.
    async fn fetch_overlays(
        &self,
        plan: &imagegate_core::EditPlan,
    ) -> Result<OverlayAssets, ImageHandlerError> {
        let wanted: BTreeSet<(String, String)> = plan
            .overlays()
            .map(|spec| (spec.bucket.clone(), spec.key.clone()))
            .collect();
        if wanted.is_empty() {
            return Ok(OverlayAssets::new());
        }

        let fetched = try_join_all(wanted.into_iter().map(|(bucket, key)| async move {
            let object = self.fetch(&bucket, &key).await?;
            Ok::<((String, String), Bytes), ImageHandlerError>(((bucket, key), object.data))
        }))
        .await?;

        Ok(fetched.into_iter().collect())
    }
}

fn map_storage_error(err: StorageError, bucket: &str, key: &str) -> ImageHandlerError {
    let failure = match &err {
        StorageError::NotFound(_) | StorageError::InvalidKey(_) => SourceFetchFailure::NotFound,
        StorageError::AccessDenied(_) => SourceFetchFailure::AccessDenied,
        StorageError::TooLarge { .. } => SourceFetchFailure::TooLarge,
        StorageError::BackendError(_) | StorageError::IoError(_) | StorageError::ConfigError(_) => {
            SourceFetchFailure::Unavailable
        }
    };
    ImageHandlerError::SourceFetch {
        failure,
        bucket: bucket.to_string(),
        key: key.to_string(),
        detail: err.to_string(),
    }
}
