//! Lessoncast Core Library
//!
//! This crate provides the domain models, error types, configuration and
//! validation shared by the server side (ticket issuance, processing state,
//! streaming references) and the client side (upload coordination, playback).
//!
//! The client-facing contracts ([`LessonVideoApi`], [`StreamingUrlProvider`],
//! [`ObjectTransport`]) live here so that the HTTP client and in-process test
//! doubles can be swapped freely behind the upload and playback crates.

pub mod config;
pub mod contract;
pub mod error;
pub mod hls;
pub mod models;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use config::Config;
pub use contract::{LessonVideoApi, ObjectTransport, ProgressSink, StreamingUrlProvider};
pub use error::{ApiOperation, AppError, ErrorMetadata, LogLevel, VideoError};
pub use hls::{HlsError, HLS_MIME};
pub use models::{
    FinalizeUploadRequest, LessonId, LessonInfo, LessonKind, ReferenceDecodeError, ReferenceShape,
    StreamUrlResponse, StreamingReference, TransitionError, UploadFile, UploadSession,
    UploadState, UploadTicket, VideoAsset, VideoStatus, DATA_URI_PREFIX,
};
pub use storage_types::StorageBackend;
pub use validation::{UploadConstraints, ValidationError};
