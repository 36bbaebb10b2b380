//! Content type detection
//!
//! The server-declared type is trusted unless it is generic or absent, in
//! which case the type is inferred from the filename extension.

use serde::{Deserialize, Serialize};

/// Fallback MIME type when nothing better is known
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Declared types that carry no information about the payload
const GENERIC_TYPES: &[&str] = &[OCTET_STREAM, "binary/octet-stream", "application/download"];

/// Closed set of rendering paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Paginated document (PDF)
    Document,
    /// Raster image
    Image,
    /// Anything else; offered as download only
    Unsupported,
}

impl ContentKind {
    pub fn from_mime(mime: &str) -> Self {
        let essence = essence(mime);
        if essence == "application/pdf" {
            ContentKind::Document
        } else if essence.starts_with("image/") {
            ContentKind::Image
        } else {
            ContentKind::Unsupported
        }
    }
}

/// Lowercased type without parameters (`text/html; charset=utf-8` -> `text/html`)
fn essence(mime: &str) -> String {
    mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

fn is_generic(essence: &str) -> bool {
    essence.is_empty() || GENERIC_TYPES.contains(&essence)
}

/// Resolve the effective MIME type of a fetched payload
///
/// `filename` is consulted before `url`, since host URLs rarely carry a
/// meaningful extension.
pub fn resolve_mime(declared: Option<&str>, filename: &str, url: &str) -> String {
    if let Some(declared) = declared {
        let essence = essence(declared);
        if !is_generic(&essence) {
            return essence;
        }
    }

    let url_path = reqwest::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string());

    mime_guess::from_path(filename)
        .first_raw()
        .or_else(|| mime_guess::from_path(&url_path).first_raw())
        .unwrap_or(OCTET_STREAM)
        .to_string()
}

/// Preferred file extension for a MIME type
pub fn extension_for(mime: &str) -> Option<&'static str> {
    let essence = essence(mime);
    match essence.as_str() {
        // mime_guess lists several extensions for these; pick the usual one
        "image/jpeg" => Some("jpg"),
        "text/plain" => Some("txt"),
        _ => mime_guess::get_mime_extensions_str(&essence).and_then(|exts| exts.first().copied()),
    }
}
