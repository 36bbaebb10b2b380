//! Native image payloads

use std::io::Cursor;

use image::ImageReader;
use serde::Serialize;

use super::{RenderError, RenderResult};

/// Image payload as handed to the viewer surface
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    pub mime: String,
    /// Intrinsic size, when the format could be decoded
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Read the intrinsic dimensions without decoding the pixels
pub fn read_dimensions(bytes: &[u8]) -> RenderResult<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| RenderError::Image(e.to_string()))?
        .into_dimensions()
        .map_err(|e| RenderError::Image(e.to_string()))
}

/// Describe an image payload
///
/// Formats the decoder does not know (SVG, for one) are still shown
/// natively, just without intrinsic dimensions.
pub fn describe(bytes: &[u8], mime: &str) -> ImageInfo {
    let (width, height) = match read_dimensions(bytes) {
        Ok((w, h)) => (Some(w), Some(h)),
        Err(e) => {
            tracing::debug!(mime, error = %e, "Could not read image dimensions");
            (None, None)
        }
    };
    ImageInfo {
        mime: mime.to_string(),
        width,
        height,
    }
}
