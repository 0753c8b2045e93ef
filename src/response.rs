//! Encoded image bodies and their HTTP representation.
//!
//! The content type always comes from the bytes themselves (`infer`), never
//! from the request path or the source extension. Every image response is
//! `200 OK`, including placeholders.

use axum::http::{HeaderName, StatusCode, header};
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use std::fmt;

/// Header reporting how a response was produced.
pub static X_IMAGE_CACHE: HeaderName = HeaderName::from_static("x-image-cache");

const FALLBACK_MIME: &str = "application/octet-stream";

/// How the body of an [`ImageResponse`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from a fresh cached derivative.
    Hit,
    /// Rendered for this request.
    Miss,
    /// The source file itself, untouched.
    Passthrough,
    /// A generated placeholder.
    Placeholder,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Passthrough => "passthrough",
            Self::Placeholder => "placeholder",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sniff the MIME type of encoded bytes.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    infer::get(bytes)
        .map(|kind| kind.mime_type())
        .unwrap_or(FALLBACK_MIME)
}

/// An encoded image ready to be streamed.
#[derive(Debug, Clone)]
pub struct ImageResponse {
    pub body: Vec<u8>,
    pub mime: &'static str,
    pub cache_status: CacheStatus,
}

impl ImageResponse {
    pub fn new(body: Vec<u8>, cache_status: CacheStatus) -> Self {
        let mime = sniff_mime(&body);
        Self {
            body,
            mime,
            cache_status,
        }
    }

    /// Strong ETag: quoted hex SHA-256 of the body.
    pub fn etag(&self) -> String {
        format!("\"{:x}\"", Sha256::digest(&self.body))
    }
}

impl IntoResponse for ImageResponse {
    fn into_response(self) -> Response {
        let etag = self.etag();
        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, self.mime.to_string()),
                (header::ETAG, etag),
                (X_IMAGE_CACHE.clone(), self.cache_status.to_string()),
            ],
            self.body,
        )
            .into_response()
    }
}
