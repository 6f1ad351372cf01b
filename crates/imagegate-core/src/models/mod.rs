//! Data models for the image pipeline
//!
//! Organized by pipeline stage: the inbound event, the resolved request
//! descriptor, the compiled edit plan, and the outbound response envelope.

mod edit;
mod event;
mod request;
mod response;

// Re-export all models for convenient imports
pub use edit::*;
pub use event::*;
pub use request::*;
pub use response::*;
