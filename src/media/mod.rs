//! Inline media for multimodal model requests
//!
//! Platform adapters download bytes; this module encodes them and decides the
//! MIME type. Priority: payload-declared type, then the file extension of the
//! resolved URL, then a fixed per-kind default. Nothing is size- or
//! type-checked.

use base64::Engine;
use serde::Serialize;

/// Base64-encoded media payload plus MIME type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineMedia {
    pub mime_type: String,
    /// Standard-alphabet base64 of the raw bytes
    pub data: String,
}

impl InlineMedia {
    /// Encode raw bytes
    #[must_use]
    pub fn encode(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

/// Pick a MIME type for downloaded media
///
/// `location` may be a full URL or a bare file path.
#[must_use]
pub fn resolve_mime(declared: Option<&str>, location: Option<&str>, default: &str) -> String {
    declared
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
        .or_else(|| location.and_then(mime_from_location).map(String::from))
        .unwrap_or_else(|| default.to_string())
}

/// Infer a MIME type from the extension of a URL path or file path
#[must_use]
pub fn mime_from_location(location: &str) -> Option<&'static str> {
    let path = url::Url::parse(location)
        .map_or_else(|_| location.to_string(), |u| u.path().to_string());
    let ext = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())?;
    if ext.contains('/') {
        return None;
    }
    mime_from_extension(&ext)
}

/// Map a file extension to a MIME type
#[must_use]
pub fn mime_from_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "oga" | "ogg" | "opus" => "audio/ogg",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "wav" => "audio/wav",
        "amr" => "audio/amr",
        "mp4" => "video/mp4",
        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        let media = InlineMedia::encode(b"hello", "image/png");
        assert_eq!(media.data, "aGVsbG8=");
        assert_eq!(media.mime_type, "image/png");
    }

    #[test]
    fn test_serializes_in_camel_case() {
        let json = serde_json::to_value(InlineMedia::encode(b"x", "audio/ogg")).unwrap();
        assert_eq!(json["mimeType"], "audio/ogg");
        assert_eq!(json["data"], "eA==");
    }

    #[test]
    fn test_declared_mime_wins() {
        let mime = resolve_mime(Some("image/png"), Some("photos/file_1.jpg"), "image/jpeg");
        assert_eq!(mime, "image/png");
    }

    #[test]
    fn test_extension_beats_default() {
        assert_eq!(resolve_mime(None, Some("voice/file_3.oga"), "audio/mpeg"), "audio/ogg");
        assert_eq!(
            resolve_mime(None, Some("https://cdn.example.com/media/abc.png?sig=1"), "image/jpeg"),
            "image/png"
        );
    }

    #[test]
    fn test_falls_back_to_default() {
        assert_eq!(resolve_mime(None, None, "image/jpeg"), "image/jpeg");
        assert_eq!(
            resolve_mime(
                Some("  "),
                Some("https://lookaside.example.com/?mid=1"),
                "image/jpeg"
            ),
            "image/jpeg"
        );
        assert_eq!(resolve_mime(None, Some("photos/file"), "image/jpeg"), "image/jpeg");
    }

    #[test]
    fn test_dot_in_directory_is_not_an_extension() {
        assert_eq!(mime_from_location("v1.2/file"), None);
    }
}
