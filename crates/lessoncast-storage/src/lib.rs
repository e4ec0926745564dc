//! Lessoncast Storage Library
//!
//! Storage abstraction for lesson video objects with S3 (via `object_store`)
//! and local filesystem backends.
//!
//! Raw uploads never pass through the application server: the server hands the
//! client a presigned PUT URL and later checks that the object arrived.
//! Streaming goes the same way in reverse through presigned GET URLs.
//!
//! # Storage key format
//!
//! - raw upload: `lessons/{lesson_id}/{uuid}.mp4`
//! - processing output: `lessons/{lesson_id}/{uuid}/hls/...`
//!
//! Key generation is centralized in the `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod signing;
pub mod traits;

// Re-export commonly used types
#[cfg(feature = "storage-local")]
pub use factory::create_local_storage;
pub use factory::create_storage;
pub use lessoncast_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use signing::{UrlMethod, UrlSigner};
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
