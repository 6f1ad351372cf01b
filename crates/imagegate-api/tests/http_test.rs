//! HTTP transport tests.
//!
//! Run with: `cargo test -p imagegate-api --test http_test`

mod helpers;

use helpers::fixtures::{decode_image, default_request_path};
use helpers::{setup_test_app, setup_test_app_with, SOURCE_BUCKET};
use image::GenericImageView;
use imagegate_detection::testing::StaticDetectionService;
use serde_json::json;

#[tokio::test]
async fn test_health_check() {
    let app = setup_test_app().await;
    let response = app.client().get("/health").await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_image_bytes_are_decoded_on_the_wire() {
    let app = setup_test_app().await;
    let path = default_request_path(&json!({
        "bucket": SOURCE_BUCKET,
        "key": "cat.png",
        "edits": {"resize": {"width": 100}}
    }));

    let response = app.client().get(&path).await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.headers()["content-type"], "image/png");
    let img = decode_image(response.as_bytes());
    assert_eq!(img.dimensions(), (100, 75));
}

#[tokio::test]
async fn test_forbidden_bucket_returns_json() {
    let app = setup_test_app().await;
    let path = default_request_path(&json!({"bucket": "private", "key": "cat.png"}));

    let response = app.client().get(&path).await;

    assert_eq!(response.status_code(), 403);
    assert_eq!(response.headers()["content-type"], "application/json");
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "ImageBucket::CannotAccessBucket");
}

#[tokio::test]
async fn test_query_and_accept_reach_the_pipeline() {
    let app = setup_test_app_with(StaticDetectionService::new(), |config| {
        config.auto_webp = true;
    })
    .await;

    let response = app
        .client()
        .get("/fit-in/50x50/images/cat.png")
        .add_query_param("expires", "29991231T235959Z")
        .add_header("Accept", "image/avif,image/webp,*/*")
        .await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.headers()["content-type"], "image/webp");
    assert_eq!(
        response.headers()["expires"],
        "Tue, 31 Dec 2999 23:59:59 GMT"
    );
}

#[tokio::test]
async fn test_cors_origin_header() {
    let app = setup_test_app_with(StaticDetectionService::new(), |config| {
        config.cors_enabled = true;
        config.cors_origin = "*".to_string();
    })
    .await;

    let response = app.client().get("/images/cat.png").await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert_eq!(response.headers()["access-control-allow-credentials"], "true");
}

#[tokio::test]
async fn test_non_get_methods_are_rejected() {
    let app = setup_test_app().await;
    let response = app.client().post("/images/cat.png").expect_failure().await;

    assert_eq!(response.status_code(), 405);
}
