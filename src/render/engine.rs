//! Document engine seam
//!
//! A `DocumentEngine` turns payload bytes into a `PagedDocument`, which
//! exposes page geometry, text layers and rasterization. Engine calls are
//! synchronous and CPU-bound; the dispatcher runs them on the blocking
//! pool under a timeout.

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, RgbaImage};
use serde::Serialize;
use thiserror::Error;

use crate::search::{PageSize, TextLayer};

/// Rendering errors
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("No document engine accepts {0}")]
    Unsupported(String),

    #[error("Document error: {0}")]
    Document(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Page not found: {0}")]
    PageNotFound(usize),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Task join error: {0}")]
    Join(String),
}

pub type RenderResult<T> = Result<T, RenderError>;

/// A rasterized page, PNG encoded
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RasterPage {
    /// Page number (1-indexed)
    pub page: usize,
    pub width: u32,
    pub height: u32,
    pub scale: f32,
    #[serde(skip)]
    pub png: Vec<u8>,
}

/// An opened paginated document
///
/// Page numbers are 1-indexed.
pub trait PagedDocument: Send + Sync {
    fn page_count(&self) -> usize;

    fn page_size(&self, page: usize) -> RenderResult<PageSize>;

    fn text_layer(&self, page: usize) -> RenderResult<TextLayer>;

    fn rasterize(&self, page: usize, scale: f32) -> RenderResult<RasterPage>;
}

/// Opens payloads of the document types it supports
pub trait DocumentEngine: Send + Sync {
    /// Whether this engine can open the MIME type
    fn accepts(&self, mime: &str) -> bool;

    fn open(&self, bytes: Arc<Vec<u8>>, mime: &str) -> RenderResult<Arc<dyn PagedDocument>>;
}

/// Encode raw RGBA pixels as PNG
pub fn encode_png(width: u32, height: u32, rgba: Vec<u8>) -> RenderResult<Vec<u8>> {
    let img = RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| RenderError::Image("Failed to create image buffer".to_string()))?;

    let mut output = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut output), image::ImageFormat::Png)
        .map_err(|e| RenderError::Image(e.to_string()))?;
    Ok(output)
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory engine serving canned text layers

    use super::*;

    pub struct FakeDocument {
        layers: Vec<TextLayer>,
    }

    impl PagedDocument for FakeDocument {
        fn page_count(&self) -> usize {
            self.layers.len()
        }

        fn page_size(&self, page: usize) -> RenderResult<PageSize> {
            let layer = self.layers.get(page.wrapping_sub(1)).ok_or(RenderError::PageNotFound(page))?;
            Ok(PageSize {
                width: layer.width,
                height: layer.height,
            })
        }

        fn text_layer(&self, page: usize) -> RenderResult<TextLayer> {
            self.layers
                .get(page.wrapping_sub(1))
                .cloned()
                .ok_or(RenderError::PageNotFound(page))
        }

        fn rasterize(&self, page: usize, scale: f32) -> RenderResult<RasterPage> {
            let size = self.page_size(page)?;
            let width = (size.width * scale / 100.0).ceil().max(1.0) as u32;
            let height = (size.height * scale / 100.0).ceil().max(1.0) as u32;
            let png = encode_png(width, height, vec![255; (width * height * 4) as usize])?;
            Ok(RasterPage {
                page,
                width,
                height,
                scale,
                png,
            })
        }
    }

    /// Engine accepting `application/pdf`; payloads starting with `%BAD`
    /// fail to open.
    #[derive(Default)]
    pub struct FakeEngine {
        layers: Vec<TextLayer>,
    }

    impl FakeEngine {
        pub fn with_layers(layers: Vec<TextLayer>) -> Self {
            Self { layers }
        }
    }

    impl DocumentEngine for FakeEngine {
        fn accepts(&self, mime: &str) -> bool {
            mime == "application/pdf"
        }

        fn open(&self, bytes: Arc<Vec<u8>>, _mime: &str) -> RenderResult<Arc<dyn PagedDocument>> {
            if bytes.starts_with(b"%BAD") {
                return Err(RenderError::Document("cannot parse document".to_string()));
            }
            Ok(Arc::new(FakeDocument {
                layers: self.layers.clone(),
            }))
        }
    }
}
