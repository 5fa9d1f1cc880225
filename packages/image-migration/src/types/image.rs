//! Image values stored in inspection record fields.
//!
//! A field holds either inline (base64, usually data-URI) payloads or
//! references to blobs that were already moved out of the document.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Prefix that marks a self-describing inline image.
pub const INLINE_PREFIX: &str = "data:image/";

/// Strings longer than this many characters are treated as inline even without the prefix.
///
/// Legacy records store raw base64 with no data-URI header. The rule is
/// permissive and will also classify a very long URL as inline.
pub const INLINE_LENGTH_THRESHOLD: usize = 1000;

/// Mime type assumed for inline payloads that carry no header.
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// One entry of an image field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageValue {
    /// Encoded image data embedded in the document
    Inline { payload: String, mime_type: String },
    /// URL of a blob stored externally
    Reference { url: String },
}

impl ImageValue {
    /// Classify a raw field value.
    pub fn classify(raw: &str) -> Self {
        if raw.starts_with(INLINE_PREFIX) {
            let rest = &raw["data:".len()..];
            let (header, payload) = rest.split_once(',').unwrap_or((rest, ""));
            let mime_type = header.split(';').next().unwrap_or(DEFAULT_MIME_TYPE);
            return ImageValue::Inline {
                payload: payload.to_string(),
                mime_type: mime_type.to_string(),
            };
        }

        if exceeds_length_threshold(raw) {
            return ImageValue::Inline {
                payload: raw.to_string(),
                mime_type: DEFAULT_MIME_TYPE.to_string(),
            };
        }

        ImageValue::Reference {
            url: raw.to_string(),
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, ImageValue::Inline { .. })
    }

    /// Decode an inline payload into raw bytes. References decode to `None`.
    pub fn decode(&self) -> Option<Result<Vec<u8>, base64::DecodeError>> {
        match self {
            ImageValue::Inline { payload, .. } => Some(decode_payload(payload)),
            ImageValue::Reference { .. } => None,
        }
    }
}

/// Shortcut for `ImageValue::classify(raw).is_inline()`.
pub fn is_inline(raw: &str) -> bool {
    raw.starts_with(INLINE_PREFIX) || exceeds_length_threshold(raw)
}

/// Character count above the threshold. Byte length bounds it from above.
fn exceeds_length_threshold(raw: &str) -> bool {
    raw.len() > INLINE_LENGTH_THRESHOLD && raw.chars().count() > INLINE_LENGTH_THRESHOLD
}

/// File extension for a mime type, falling back to `jpg`.
pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/heic" => "heic",
        "image/bmp" => "bmp",
        "image/svg+xml" => "svg",
        _ => "jpg",
    }
}

fn decode_payload(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    // Some clients wrap base64 across lines
    if payload.contains(char::is_whitespace) {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD.decode(compact)
    } else {
        STANDARD.decode(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_data_uri_is_inline() {
        let value = ImageValue::classify("data:image/png;base64,aGVsbG8=");
        assert_eq!(
            value,
            ImageValue::Inline {
                payload: "aGVsbG8=".to_string(),
                mime_type: "image/png".to_string(),
            }
        );
        assert_eq!(value.decode().unwrap().unwrap(), b"hello");
    }

    #[test]
    fn test_short_url_is_reference() {
        let url = "https://storage.example.com/substation/abc/before_0.jpg";
        assert_eq!(
            ImageValue::classify(url),
            ImageValue::Reference {
                url: url.to_string()
            }
        );
        assert!(ImageValue::classify(url).decode().is_none());
    }

    #[test]
    fn test_length_threshold_is_exclusive() {
        let at_threshold = "a".repeat(INLINE_LENGTH_THRESHOLD);
        let over_threshold = "a".repeat(INLINE_LENGTH_THRESHOLD + 1);

        assert!(!ImageValue::classify(&at_threshold).is_inline());
        match ImageValue::classify(&over_threshold) {
            ImageValue::Inline { mime_type, payload } => {
                assert_eq!(mime_type, DEFAULT_MIME_TYPE);
                assert_eq!(payload, over_threshold);
            }
            other => panic!("expected inline, got {:?}", other),
        }
    }

    #[test]
    fn test_long_url_is_misclassified_as_inline() {
        // Documented heuristic: long references are treated as inline too
        let long_url = format!("https://cdn.example.com/{}", "x".repeat(1200));
        assert!(ImageValue::classify(&long_url).is_inline());
    }

    #[test]
    fn test_threshold_counts_characters_not_bytes() {
        // 600 characters, 1200 bytes
        let url = format!("https://cdn.example.com/{}", "é".repeat(576));
        assert_eq!(url.chars().count(), 600);
        assert!(url.len() > INLINE_LENGTH_THRESHOLD);

        assert!(!ImageValue::classify(&url).is_inline());
        assert!(!is_inline(&url));
    }

    #[test]
    fn test_wrapped_base64_decodes() {
        let value = ImageValue::classify("data:image/jpeg;base64,aGVs\nbG8=");
        assert_eq!(value.decode().unwrap().unwrap(), b"hello");
    }

    #[test]
    fn test_garbage_payload_fails_to_decode() {
        let value = ImageValue::classify("data:image/jpeg;base64,!!!not-base64!!!");
        assert!(value.decode().unwrap().is_err());
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("application/octet-stream"), "jpg");
    }

    proptest! {
        #[test]
        fn prop_prefixed_strings_are_inline(body in ".{0,64}") {
            let raw = format!("{}{}", INLINE_PREFIX, body);
            prop_assert!(ImageValue::classify(&raw).is_inline());
            prop_assert!(is_inline(&raw));
        }

        #[test]
        fn prop_long_strings_are_inline(extra in 1usize..200) {
            let raw = "u".repeat(INLINE_LENGTH_THRESHOLD + extra);
            prop_assert!(ImageValue::classify(&raw).is_inline());
        }

        #[test]
        fn prop_multibyte_strings_use_character_count(chars in 1usize..1000) {
            let raw = "ü".repeat(chars);
            prop_assert!(!is_inline(&raw));
            prop_assert!(!ImageValue::classify(&raw).is_inline());
        }

        #[test]
        fn prop_short_unprefixed_strings_are_references(raw in "[a-z0-9:/._-]{0,200}") {
            prop_assume!(!raw.starts_with(INLINE_PREFIX));
            prop_assert!(!ImageValue::classify(&raw).is_inline());
            prop_assert!(!is_inline(&raw));
        }
    }
}
