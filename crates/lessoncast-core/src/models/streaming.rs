use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use utoipa::ToSchema;

use crate::hls::HLS_MIME;

/// Prefix of a streaming reference that embeds the whole manifest.
pub const DATA_URI_PREFIX: &str = "data:application/vnd.apple.mpegurl;base64,";

/// Opaque, time-limited value a player loads to start playback.
///
/// Either a plain URL (manifest or progressive file) or a data URI carrying a
/// complete HLS manifest. Callers dispatch on [`StreamingReference::classify`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct StreamingReference(String);

/// The two shapes a reference can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceShape<'a> {
    /// Base64 payload of an embedded manifest, without the data URI prefix.
    EmbeddedManifest { payload: &'a str },
    Url(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceDecodeError {
    #[error("Streaming reference is not an embedded manifest")]
    NotEmbedded,

    #[error("Invalid base64 payload: {0}")]
    Base64(String),

    #[error("Embedded manifest is not valid UTF-8")]
    NotUtf8,
}

impl StreamingReference {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Embeds manifest text as a data URI.
    pub fn from_manifest(manifest: &str) -> Self {
        let payload = base64::engine::general_purpose::STANDARD.encode(manifest.as_bytes());
        Self(format!("{}{}", DATA_URI_PREFIX, payload))
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// The MIME match is case-insensitive; anything else is treated as a URL.
    pub fn classify(&self) -> ReferenceShape<'_> {
        let value = self.0.as_str();
        let prefix_len = DATA_URI_PREFIX.len();
        if value.len() >= prefix_len
            && value.is_char_boundary(prefix_len)
            && value[..prefix_len].eq_ignore_ascii_case(DATA_URI_PREFIX)
        {
            ReferenceShape::EmbeddedManifest {
                payload: &value[prefix_len..],
            }
        } else {
            ReferenceShape::Url(value)
        }
    }

    pub fn is_embedded_manifest(&self) -> bool {
        matches!(self.classify(), ReferenceShape::EmbeddedManifest { .. })
    }

    /// Decodes an embedded manifest back into playlist text.
    pub fn decode_manifest(&self) -> Result<String, ReferenceDecodeError> {
        match self.classify() {
            ReferenceShape::EmbeddedManifest { payload } => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(payload.trim())
                    .map_err(|e| ReferenceDecodeError::Base64(e.to_string()))?;
                String::from_utf8(bytes).map_err(|_| ReferenceDecodeError::NotUtf8)
            }
            ReferenceShape::Url(_) => Err(ReferenceDecodeError::NotEmbedded),
        }
    }

    pub fn mime_type(&self) -> Option<&'static str> {
        self.is_embedded_manifest().then_some(HLS_MIME)
    }
}

impl Display for StreamingReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.classify() {
            // Embedded manifests carry presigned segment URLs; never print them whole.
            ReferenceShape::EmbeddedManifest { payload } => {
                write!(f, "{}<{} bytes>", DATA_URI_PREFIX, payload.len())
            }
            ReferenceShape::Url(url) => write!(f, "{}", url),
        }
    }
}

impl From<String> for StreamingReference {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Response body of the streaming reference endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StreamUrlResponse {
    #[schema(value_type = String)]
    pub stream_url: StreamingReference,
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = "#EXTM3U\n#EXT-X-VERSION:3\n#EXTINF:6.0,\nhttps://s3/seg0.ts?sig=1\n#EXT-X-ENDLIST\n";

    #[test]
    fn test_embedded_reference_decodes_to_playlist() {
        let reference = StreamingReference::from_manifest(MANIFEST);
        assert!(reference.as_str().starts_with(DATA_URI_PREFIX));
        assert!(reference.is_embedded_manifest());

        let decoded = reference.decode_manifest().unwrap();
        assert!(decoded.starts_with("#EXTM3U"));
        assert_eq!(decoded, MANIFEST);
    }

    #[test]
    fn test_plain_url_is_not_embedded() {
        let reference = StreamingReference::from_url("https://cdn.example.com/lessons/1/a.mp4");
        assert_eq!(
            reference.classify(),
            ReferenceShape::Url("https://cdn.example.com/lessons/1/a.mp4")
        );
        assert_eq!(
            reference.decode_manifest(),
            Err(ReferenceDecodeError::NotEmbedded)
        );
        assert_eq!(reference.mime_type(), None);
    }

    #[test]
    fn test_classify_ignores_prefix_case() {
        let reference = StreamingReference::new("DATA:application/vnd.apple.mpegurl;BASE64,I0VYVE0zVQ==");
        assert_eq!(reference.decode_manifest().unwrap(), "#EXTM3U");
    }

    #[test]
    fn test_corrupt_payload_is_reported() {
        let reference = StreamingReference::new(format!("{}not*base64", DATA_URI_PREFIX));
        assert!(matches!(
            reference.decode_manifest(),
            Err(ReferenceDecodeError::Base64(_))
        ));
    }

    #[test]
    fn test_response_serializes_as_plain_string() {
        let body = StreamUrlResponse {
            stream_url: StreamingReference::from_url("https://x/y.m3u8"),
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"streamUrl":"https://x/y.m3u8"}"#);
    }

    #[test]
    fn test_display_redacts_embedded_payload() {
        let reference = StreamingReference::from_manifest(MANIFEST);
        let shown = reference.to_string();
        assert!(!shown.contains("sig=1"));
        assert!(shown.ends_with("bytes>"));
    }
}
