//! HLS playlist helpers.
//!
//! Playlists are handled as text: the server only needs to find URI lines,
//! pick a variant out of a master playlist and swap URIs for presigned ones.
//! Everything else passes through untouched.

use std::fmt::Write;

/// MIME type of an HLS playlist.
pub const HLS_MIME: &str = "application/vnd.apple.mpegurl";

const HEADER: &str = "#EXTM3U";
const STREAM_INF: &str = "#EXT-X-STREAM-INF";
const URI_ATTR: &str = "URI=\"";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HlsError {
    #[error("Playlist is empty")]
    Empty,

    #[error("Playlist does not start with #EXTM3U")]
    MissingHeader,

    #[error("Master playlist has no variant streams")]
    NoVariants,
}

/// A variant stream of a master playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantStream {
    pub bandwidth: u64,
    pub uri: String,
}

/// Checks the playlist header. A leading byte order mark is tolerated.
pub fn validate_manifest(text: &str) -> Result<(), HlsError> {
    let text = text.trim_start_matches('\u{feff}').trim_start();
    if text.is_empty() {
        return Err(HlsError::Empty);
    }
    if !text.starts_with(HEADER) {
        return Err(HlsError::MissingHeader);
    }
    Ok(())
}

pub fn is_master_playlist(text: &str) -> bool {
    text.lines().any(|line| line.trim_start().starts_with(STREAM_INF))
}

/// Variant streams in playlist order.
pub fn variant_streams(text: &str) -> Vec<VariantStream> {
    let mut variants = Vec::new();
    let mut pending_bandwidth: Option<u64> = None;

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        if let Some(attrs) = line.strip_prefix(STREAM_INF) {
            pending_bandwidth = Some(
                attribute(attrs, "BANDWIDTH")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0),
            );
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        if let Some(bandwidth) = pending_bandwidth.take() {
            variants.push(VariantStream {
                bandwidth,
                uri: line.to_string(),
            });
        }
    }

    variants
}

/// Highest-bandwidth variant; ties go to the one listed first.
pub fn select_variant(text: &str) -> Result<VariantStream, HlsError> {
    variant_streams(text)
        .into_iter()
        .reduce(|best, v| if v.bandwidth > best.bandwidth { v } else { best })
        .ok_or(HlsError::NoVariants)
}

/// URIs referenced by the playlist: plain URI lines plus `URI="..."` attributes
/// of tags such as `#EXT-X-KEY` and `#EXT-X-MAP`.
pub fn referenced_uris(text: &str) -> Vec<String> {
    let mut uris = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        if line.starts_with('#') {
            if let Some((start, end)) = uri_attribute_span(line) {
                uris.push(line[start..end].to_string());
            }
        } else {
            uris.push(line.to_string());
        }
    }
    uris
}

/// Rewrites every referenced URI through `f`, keeping all other lines intact.
///
/// Stops at the first error `f` returns.
pub fn rewrite_uris<F, E>(text: &str, mut f: F) -> Result<String, E>
where
    F: FnMut(&str) -> Result<String, E>,
{
    let mut out = String::with_capacity(text.len() * 2);

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            out.push('\n');
            continue;
        }

        if line.starts_with('#') {
            match uri_attribute_span(line) {
                Some((start, end)) => {
                    let replaced = f(&line[start..end])?;
                    let _ = write!(out, "{}{}{}", &line[..start], replaced, &line[end..]);
                }
                None => out.push_str(line),
            }
        } else {
            out.push_str(&f(line)?);
        }
        out.push('\n');
    }

    Ok(out)
}

/// Resolves a playlist-relative URI against the storage key of the playlist.
///
/// Absolute URLs are returned unchanged. `..` segments are collapsed but can
/// never climb above the key root.
pub fn resolve_key(playlist_key: &str, uri: &str) -> String {
    if is_absolute_url(uri) {
        return uri.to_string();
    }

    let uri = uri.split(['?', '#']).next().unwrap_or(uri);
    let mut parts: Vec<&str> = if uri.starts_with('/') {
        Vec::new()
    } else {
        match playlist_key.rfind('/') {
            Some(idx) => playlist_key[..idx].split('/').filter(|p| !p.is_empty()).collect(),
            None => Vec::new(),
        }
    };

    for part in uri.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    parts.join("/")
}

pub fn is_absolute_url(uri: &str) -> bool {
    let lower = uri.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("data:")
}

fn uri_attribute_span(line: &str) -> Option<(usize, usize)> {
    let start = line.find(URI_ATTR)? + URI_ATTR.len();
    let len = line[start..].find('"')?;
    Some((start, start + len))
}

fn attribute<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    attrs
        .trim_start_matches(':')
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case(name))
        .map(|(_, v)| v.trim().trim_matches('"'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEDIA: &str = "#EXTM3U\n#EXT-X-VERSION:7\n#EXT-X-TARGETDURATION:6\n#EXT-X-MAP:URI=\"init.mp4\"\n#EXTINF:6.0,\nseg0.m4s\n#EXTINF:4.2,\nseg1.m4s\n#EXT-X-ENDLIST\n";

    const MASTER: &str = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\n360p/index.m3u8\n#EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1280x720,CODECS=\"avc1.4d401f,mp4a.40.2\"\n720p/index.m3u8\n#EXT-X-STREAM-INF:BANDWIDTH=1400000\n480p/index.m3u8\n";

    #[test]
    fn test_validate_manifest() {
        assert!(validate_manifest(MEDIA).is_ok());
        assert!(validate_manifest("\u{feff}#EXTM3U\n").is_ok());
        assert_eq!(validate_manifest("  \n"), Err(HlsError::Empty));
        assert_eq!(validate_manifest("<html>"), Err(HlsError::MissingHeader));
    }

    #[test]
    fn test_select_highest_bandwidth_variant() {
        assert!(is_master_playlist(MASTER));
        assert!(!is_master_playlist(MEDIA));

        let variant = select_variant(MASTER).unwrap();
        assert_eq!(variant.uri, "720p/index.m3u8");
        assert_eq!(variant.bandwidth, 2_800_000);
        assert_eq!(select_variant(MEDIA), Err(HlsError::NoVariants));
    }

    #[test]
    fn test_rewrite_covers_segments_and_map() {
        let rewritten: Result<String, ()> =
            rewrite_uris(MEDIA, |uri| Ok(format!("https://s3/{}?sig=x", uri)));
        let rewritten = rewritten.unwrap();

        assert!(rewritten.contains("#EXT-X-MAP:URI=\"https://s3/init.mp4?sig=x\""));
        assert!(rewritten.contains("\nhttps://s3/seg0.m4s?sig=x\n"));
        assert!(rewritten.contains("\nhttps://s3/seg1.m4s?sig=x\n"));
        assert!(rewritten.contains("#EXTINF:4.2,"));
        assert!(rewritten.starts_with("#EXTM3U\n"));
    }

    #[test]
    fn test_rewrite_stops_on_error() {
        let mut calls = 0;
        let result = rewrite_uris(MEDIA, |_| {
            calls += 1;
            Err::<String, _>("presign failed")
        });
        assert_eq!(result, Err("presign failed"));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_referenced_uris() {
        assert_eq!(
            referenced_uris(MEDIA),
            vec!["init.mp4", "seg0.m4s", "seg1.m4s"]
        );
    }

    #[test]
    fn test_resolve_key() {
        let playlist = "lessons/4/abc/hls/index.m3u8";
        assert_eq!(resolve_key(playlist, "seg0.ts"), "lessons/4/abc/hls/seg0.ts");
        assert_eq!(
            resolve_key(playlist, "720p/index.m3u8"),
            "lessons/4/abc/hls/720p/index.m3u8"
        );
        assert_eq!(resolve_key(playlist, "../poster.jpg?v=2"), "lessons/4/abc/poster.jpg");
        assert_eq!(resolve_key(playlist, "/other/seg.ts"), "other/seg.ts");
        assert_eq!(resolve_key("index.m3u8", "../../x.ts"), "x.ts");
        assert_eq!(
            resolve_key(playlist, "https://cdn/seg.ts"),
            "https://cdn/seg.ts"
        );
    }
}
