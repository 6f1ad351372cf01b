//! Imagegate Storage Library
//!
//! This crate provides the read-only object storage capability used by the image
//! pipeline: the [`Storage`] trait and implementations for S3 and the local
//! filesystem.
//!
//! # Object addressing
//!
//! Objects are addressed by `(bucket, key)`. The S3 backend maps buckets to S3
//! buckets; the local backend maps them to directories under its root, so an
//! object lives at `<root>/<bucket>/<key>`.
//!
//! Keys must not contain `..` or a leading `/`.

pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use imagegate_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult, StoredObject};
