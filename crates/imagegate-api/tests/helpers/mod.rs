//! Test helpers: build the handler and router over a temp-dir local store.
//!
//! Run from workspace root: `cargo test -p imagegate-api`.

#![allow(dead_code)]

pub mod fixtures;
pub mod storage;

use axum_test::TestServer;
use imagegate_api::setup::routes;
use imagegate_api::ImageHandler;
use imagegate_core::{HandlerConfig, StorageBackend};
use imagegate_detection::testing::StaticDetectionService;
use imagegate_storage::LocalStorage;
use std::sync::Arc;
use tempfile::TempDir;

pub const SOURCE_BUCKET: &str = "images";
pub const OVERLAY_BUCKET: &str = "overlays";

/// Test application: handler, HTTP server, and owned resources.
pub struct TestApp {
    pub handler: Arc<ImageHandler>,
    pub server: TestServer,
    pub detection: Arc<StaticDetectionService>,
    pub temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn put(&self, bucket: &str, key: &str, data: &[u8]) {
        storage::put_object(self.temp_dir.path(), bucket, key, data);
    }
}

pub fn test_config(root: &TempDir) -> HandlerConfig {
    HandlerConfig {
        source_buckets: vec![SOURCE_BUCKET.to_string(), OVERLAY_BUCKET.to_string()],
        storage_backend: StorageBackend::Local,
        local_storage_path: Some(root.path().display().to_string()),
        fetch_timeout_ms: 2_000,
        detection_timeout_ms: 2_000,
        ..Default::default()
    }
}

/// Setup a test app with the default configuration and no detections.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(StaticDetectionService::new(), |_| {}).await
}

/// Setup a test app with a custom detection fake and configuration tweaks.
pub async fn setup_test_app_with<F>(detection: StaticDetectionService, configure: F) -> TestApp
where
    F: FnOnce(&mut HandlerConfig),
{
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = test_config(&temp_dir);
    configure(&mut config);
    config.validate().expect("Test configuration is invalid");

    storage::put_object(
        temp_dir.path(),
        SOURCE_BUCKET,
        "cat.png",
        &fixtures::create_test_png(200, 150),
    );

    let storage = LocalStorage::new(temp_dir.path())
        .await
        .expect("Failed to create local storage")
        .with_max_object_bytes(config.max_source_bytes as u64);
    let detection = Arc::new(detection);

    let handler = Arc::new(ImageHandler::new(
        Arc::new(config),
        Arc::new(storage),
        detection.clone(),
    ));
    let server =
        TestServer::new(routes::setup_routes(handler.clone())).expect("Failed to start test server");

    TestApp {
        handler,
        server,
        detection,
        temp_dir,
    }
}
