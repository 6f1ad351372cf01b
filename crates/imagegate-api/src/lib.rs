//! Imagegate API Library
//!
//! The pipeline orchestrator, the response mapper, and the axum transport that
//! turns HTTP requests into inbound events and envelopes back into responses.

pub mod handler;
pub mod response;
pub mod setup;
pub mod telemetry;

pub use handler::ImageHandler;
pub use response::CacheMeta;
