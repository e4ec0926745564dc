//! API constants.

/// Prefix of every versioned route.
pub const API_PREFIX: &str = "/api/v1";

/// Route serving objects of the local storage backend.
pub const MEDIA_PREFIX: &str = "/media";

pub const OPENAPI_PATH: &str = "/api/openapi.json";
