//! Storage key layout for lesson videos.
//!
//! - raw upload: `lessons/{lesson_id}/{uuid}.mp4`
//! - processing output: `lessons/{lesson_id}/{uuid}/hls/...`, playlist `index.m3u8`
//!
//! Keys never contain `..` or a leading `/`.

use lessoncast_core::LessonId;
use uuid::Uuid;

use crate::traits::{StorageError, StorageResult};

const HLS_DIR: &str = "hls";
pub const MANIFEST_FILE: &str = "index.m3u8";

/// Fresh key for a raw upload of `lesson_id`.
pub fn upload_key(lesson_id: LessonId) -> String {
    format!("lessons/{}/{}.mp4", lesson_id, Uuid::new_v4())
}

/// Every object belonging to a lesson lives under this prefix.
pub fn lesson_prefix(lesson_id: LessonId) -> String {
    format!("lessons/{}/", lesson_id)
}

pub fn belongs_to_lesson(lesson_id: LessonId, storage_key: &str) -> bool {
    storage_key.starts_with(&lesson_prefix(lesson_id))
}

/// Prefix holding the processing output derived from a raw upload key.
pub fn hls_prefix(object_key: &str) -> String {
    let stem = match object_key.rsplit_once('.') {
        Some((stem, ext)) if !ext.contains('/') => stem,
        _ => object_key,
    };
    format!("{}/{}/", stem, HLS_DIR)
}

/// Default playlist location for a raw upload key.
pub fn manifest_key(object_key: &str) -> String {
    format!("{}{}", hls_prefix(object_key), MANIFEST_FILE)
}

/// Rejects keys that could escape the storage root.
pub fn validate_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if storage_key.contains("..") || storage_key.starts_with('/') || storage_key.contains('\\') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

/// Content type served for an object, by extension.
pub fn content_type_for_key(storage_key: &str) -> &'static str {
    let ext = storage_key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "m3u8" => lessoncast_core::HLS_MIME,
        "ts" => "video/mp2t",
        "m4s" => "video/iso.segment",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}
