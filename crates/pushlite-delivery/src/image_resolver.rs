//! Resolution of the caller-supplied `image` field.
//!
//! The field is ambiguous between a remote URL, a `data:` URI, and a bare
//! base64 payload. It is resolved exactly once at admission into a
//! [`PushImage`] so the dispatcher never inspects the raw string again.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use thiserror::Error;
use url::Url;

use crate::push_contract::PushImage;

const BASE64_SCHEME_PREFIX: &str = "base64://";
const DATA_URI_PREFIX: &str = "data:";
const DATA_URI_BASE64_MARKER: &str = ";base64";
const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Limits applied while decoding inline images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageResolvePolicy {
    pub max_inline_bytes: usize,
}

impl Default for ImageResolvePolicy {
    fn default() -> Self {
        Self {
            max_inline_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Enumerates reasons an image field cannot be resolved.
pub enum ImageResolveError {
    #[error("image url is invalid: {detail}")]
    InvalidUrl { detail: String },
    #[error("image data uri is invalid: {detail}")]
    InvalidDataUri { detail: String },
    #[error("image is neither an http(s) url nor valid base64: {detail}")]
    InvalidBase64 { detail: String },
    #[error("image data uri declares non-image mime type '{mime_type}'")]
    UnsupportedMimeType { mime_type: String },
    #[error("image payload is empty")]
    EmptyPayload,
    #[error("image payload is {size} bytes which exceeds the limit of {max} bytes")]
    TooLarge { size: usize, max: usize },
}

/// Resolves the raw `image` field. An empty or blank field means "no image".
pub fn resolve_push_image(
    raw: &str,
    policy: ImageResolvePolicy,
) -> Result<Option<PushImage>, ImageResolveError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    if has_http_scheme(trimmed) {
        return resolve_remote_image(trimmed).map(Some);
    }

    if let Some(data_uri) = strip_prefix_ignore_ascii_case(trimmed, DATA_URI_PREFIX) {
        let (declared_mime, payload) = split_data_uri(data_uri)?;
        if let Some(mime) = declared_mime {
            if strip_prefix_ignore_ascii_case(mime, "image/").is_none() {
                return Err(ImageResolveError::UnsupportedMimeType {
                    mime_type: mime.to_string(),
                });
            }
        }
        let bytes = decode_inline_payload(payload, policy)?;
        let mime_type = declared_mime
            .map(str::to_string)
            .unwrap_or_else(|| sniff_image_mime_type(&bytes).to_string());
        return Ok(Some(PushImage::Inline { bytes, mime_type }));
    }

    let payload =
        strip_prefix_ignore_ascii_case(trimmed, BASE64_SCHEME_PREFIX).unwrap_or(trimmed);
    let bytes = decode_inline_payload(payload, policy)?;
    let mime_type = sniff_image_mime_type(&bytes).to_string();
    Ok(Some(PushImage::Inline { bytes, mime_type }))
}

/// Whether `bytes` start with the signature of an image format the send
/// primitive can forward.
pub fn is_recognized_image_format(bytes: &[u8]) -> bool {
    sniff_image_mime_type(bytes) != FALLBACK_MIME_TYPE
}

/// Infers a mime type from well-known image magic bytes.
pub fn sniff_image_mime_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        "image/gif"
    } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else if bytes.starts_with(b"BM") {
        "image/bmp"
    } else if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
        "image/tiff"
    } else if bytes.starts_with(&[0x00, 0x00, 0x01, 0x00]) {
        "image/x-icon"
    } else {
        FALLBACK_MIME_TYPE
    }
}

fn has_http_scheme(value: &str) -> bool {
    strip_prefix_ignore_ascii_case(value, "http://").is_some()
        || strip_prefix_ignore_ascii_case(value, "https://").is_some()
}

fn strip_prefix_ignore_ascii_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        value.get(prefix.len()..)
    } else {
        None
    }
}

fn resolve_remote_image(raw: &str) -> Result<PushImage, ImageResolveError> {
    let url = Url::parse(raw).map_err(|error| ImageResolveError::InvalidUrl {
        detail: error.to_string(),
    })?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ImageResolveError::InvalidUrl {
            detail: "url has no host".to_string(),
        });
    }
    Ok(PushImage::Remote {
        url: url.to_string(),
    })
}

fn split_data_uri(data_uri: &str) -> Result<(Option<&str>, &str), ImageResolveError> {
    let Some((header, payload)) = data_uri.split_once(',') else {
        return Err(ImageResolveError::InvalidDataUri {
            detail: "missing ',' separator".to_string(),
        });
    };
    let Some(mime) = header.strip_suffix(DATA_URI_BASE64_MARKER) else {
        return Err(ImageResolveError::InvalidDataUri {
            detail: "only base64-encoded data uris are supported".to_string(),
        });
    };
    let mime = mime.trim();
    Ok(((!mime.is_empty()).then_some(mime), payload))
}

fn decode_inline_payload(
    payload: &str,
    policy: ImageResolvePolicy,
) -> Result<Vec<u8>, ImageResolveError> {
    let compact = payload
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .collect::<String>();
    if compact.is_empty() {
        return Err(ImageResolveError::EmptyPayload);
    }
    // Cheap upper bound before allocating the decoded buffer.
    let estimated = compact.len() / 4 * 3;
    if estimated > policy.max_inline_bytes.saturating_add(3) {
        return Err(ImageResolveError::TooLarge {
            size: estimated,
            max: policy.max_inline_bytes,
        });
    }

    let bytes = STANDARD
        .decode(compact.as_bytes())
        .or_else(|standard_error| {
            URL_SAFE
                .decode(compact.as_bytes())
                .map_err(|_| standard_error)
        })
        .map_err(|error| ImageResolveError::InvalidBase64 {
            detail: error.to_string(),
        })?;
    if bytes.is_empty() {
        return Err(ImageResolveError::EmptyPayload);
    }
    if bytes.len() > policy.max_inline_bytes {
        return Err(ImageResolveError::TooLarge {
            size: bytes.len(),
            max: policy.max_inline_bytes,
        });
    }
    Ok(bytes)
}
