//! Application setup and initialization

pub mod routes;
pub mod server;

use crate::handler::ImageHandler;
use anyhow::{Context, Result};
use imagegate_core::HandlerConfig;
use imagegate_detection::create_detection_service;
use imagegate_storage::create_storage;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: HandlerConfig) -> Result<(Arc<ImageHandler>, axum::Router)> {
    // Validate configuration first - fail fast on misconfiguration
    config
        .validate()
        .context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config.is_production())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment,
        buckets = %config.source_buckets.join(","),
        front_door = %config.front_door,
        "Configuration loaded and validated successfully"
    );

    let storage = create_storage(&config)
        .await
        .context("Failed to initialize storage")?;
    tracing::info!(backend = %storage.backend_type(), "Storage initialized");

    let detection = create_detection_service(&config).await;
    tracing::info!(backend = detection.name(), "Detection initialized");

    let config = Arc::new(config);
    let handler = Arc::new(ImageHandler::new(config.clone(), storage, detection));
    let router = routes::setup_routes(handler.clone());

    Ok((handler, router))
}
