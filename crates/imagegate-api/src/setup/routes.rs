//! Route configuration and setup
//!
//! Every path except `/health` is an image request. The transport builds an
//! [`InboundEvent`] from the HTTP request and writes the envelope back out.

use crate::handler::ImageHandler;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use imagegate_core::{InboundEvent, ResponseEnvelope};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(handler: Arc<ImageHandler>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .fallback(serve_image)
        .with_state(handler)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn serve_image(
    State(handler): State<Arc<ImageHandler>>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let event = build_event(&uri, query, &headers, handler.config().front_door);
    let envelope = handler.handle(&event).await;
    envelope_to_response(envelope)
}

fn build_event(
    uri: &Uri,
    query: HashMap<String, String>,
    headers: &HeaderMap,
    front_door: imagegate_core::FrontDoor,
) -> InboundEvent {
    let mut event = InboundEvent::new(uri.path()).with_front_door(front_door);
    event.query = query;
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            event = event.with_header(name.as_str(), value);
        }
    }
    event
}

/// Write an envelope as an HTTP response, decoding base64 bodies.
pub fn envelope_to_response(envelope: ResponseEnvelope) -> Response {
    let body = if envelope.is_base64_encoded {
        match STANDARD.decode(envelope.body.as_bytes()) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "Response body is not valid base64");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    } else {
        envelope.body.into_bytes()
    };

    let status =
        StatusCode::from_u16(envelope.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;

    let response_headers = response.headers_mut();
    for (name, value) in &envelope.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                response_headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Dropping unrepresentable response header"),
        }
    }
    response
}
