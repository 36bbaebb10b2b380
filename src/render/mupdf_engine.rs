//! MuPDF-backed document engine
//!
//! MuPDF documents are not thread-safe. `MupdfDocument` keeps the payload
//! bytes and opens a fresh `mupdf::Document` for every operation, with a
//! `parking_lot::Mutex` serializing access.

use std::sync::Arc;

use mupdf::{Colorspace, Document, Matrix, TextPageOptions};
use parking_lot::Mutex;

use crate::search::{CharBox, PageSize, Rect, TextLayer, TextRun};

use super::engine::{encode_png, DocumentEngine, PagedDocument, RasterPage, RenderError, RenderResult};

const PDF_MIME: &str = "application/pdf";

/// Largest raster scale accepted
const MAX_SCALE: f32 = 4.0;

impl From<mupdf::Error> for RenderError {
    fn from(e: mupdf::Error) -> Self {
        RenderError::Document(e.to_string())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MupdfEngine;

impl MupdfEngine {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentEngine for MupdfEngine {
    fn accepts(&self, mime: &str) -> bool {
        mime == PDF_MIME
    }

    fn open(&self, bytes: Arc<Vec<u8>>, mime: &str) -> RenderResult<Arc<dyn PagedDocument>> {
        Ok(Arc::new(MupdfDocument::open(bytes, mime)?))
    }
}

pub struct MupdfDocument {
    bytes: Arc<Vec<u8>>,
    mime: String,
    pages: Vec<PageSize>,
    _lock: Mutex<()>,
}

// SAFETY: the only state shared across threads is the immutable payload,
// the page sizes and the lock. Every MuPDF handle is created inside
// `with_doc` under `_lock` and dropped before it returns, so no MuPDF
// object ever crosses a thread boundary.
unsafe impl Send for MupdfDocument {}
unsafe impl Sync for MupdfDocument {}

impl MupdfDocument {
    pub fn open(bytes: Arc<Vec<u8>>, mime: &str) -> RenderResult<Self> {
        let doc = Document::from_bytes(&bytes, mime)?;
        let count = doc.page_count()?.max(0) as usize;

        let mut pages = Vec::with_capacity(count);
        for index in 0..count {
            let bounds = doc.load_page(index as i32)?.bounds()?;
            pages.push(PageSize {
                width: bounds.x1 - bounds.x0,
                height: bounds.y1 - bounds.y0,
            });
        }

        Ok(Self {
            bytes,
            mime: mime.to_string(),
            pages,
            _lock: Mutex::new(()),
        })
    }

    fn with_doc<F, R>(&self, f: F) -> RenderResult<R>
    where
        F: FnOnce(&Document) -> RenderResult<R>,
    {
        let _guard = self._lock.lock();
        let doc = Document::from_bytes(&self.bytes, &self.mime)?;
        f(&doc)
    }

    fn page_index(&self, page: usize) -> RenderResult<i32> {
        if page == 0 || page > self.pages.len() {
            return Err(RenderError::PageNotFound(page));
        }
        Ok((page - 1) as i32)
    }
}

impl PagedDocument for MupdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, page: usize) -> RenderResult<PageSize> {
        self.page_index(page)?;
        Ok(self.pages[page - 1])
    }

    fn text_layer(&self, page: usize) -> RenderResult<TextLayer> {
        let index = self.page_index(page)?;
        let size = self.pages[page - 1];

        self.with_doc(|doc| {
            let text_page = doc.load_page(index)?.to_text_page(TextPageOptions::empty())?;
            let mut layer = TextLayer::new(page, size.width, size.height);

            for block in text_page.blocks() {
                for line in block.lines() {
                    let mut text = String::new();
                    let mut boxes = Vec::new();

                    for ch in line.chars() {
                        let Some(c) = ch.char() else { continue };
                        let quad = ch.quad();
                        let x = quad.ul.x.min(quad.ll.x);
                        let width = (quad.ur.x.max(quad.lr.x) - x).max(0.0);
                        text.push(c);
                        boxes.push(CharBox { ch: c, x, width });
                    }

                    if text.is_empty() {
                        continue;
                    }

                    let b = line.bounds();
                    let bbox = Rect::new(b.x0, b.y0, b.x1 - b.x0, b.y1 - b.y0);
                    layer.runs.push(TextRun::new(text, bbox).with_char_boxes(boxes));
                }
            }

            Ok(layer)
        })
    }

    fn rasterize(&self, page: usize, scale: f32) -> RenderResult<RasterPage> {
        let index = self.page_index(page)?;
        let scale = scale.clamp(0.1, MAX_SCALE);

        self.with_doc(|doc| {
            let matrix = Matrix::new_scale(scale, scale);
            let pixmap = doc
                .load_page(index)?
                .to_pixmap(&matrix, &Colorspace::device_rgb(), true, true)?;

            let width = pixmap.width() as u32;
            let height = pixmap.height() as u32;
            let samples = pixmap.samples();
            let n = pixmap.n() as usize;

            let mut rgba = Vec::with_capacity((width * height * 4) as usize);
            for pixel in 0..(width * height) as usize {
                let offset = pixel * n;
                let channel = |i: usize, default: u8| samples.get(offset + i).copied().unwrap_or(default);
                let alpha = if n >= 4 { channel(3, 255) } else { 255 };
                rgba.extend_from_slice(&[channel(0, 0), channel(1, 0), channel(2, 0), alpha]);
            }

            Ok(RasterPage {
                page,
                width,
                height,
                scale,
                png: encode_png(width, height, rgba)?,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_accepts_pdf_only() {
        let engine = MupdfEngine::new();
        assert!(engine.accepts("application/pdf"));
        assert!(!engine.accepts("image/png"));
        assert!(!engine.accepts("text/plain"));
    }

    #[test]
    fn test_garbage_fails_to_open() {
        let engine = MupdfEngine::new();
        let result = engine.open(Arc::new(b"not a pdf".to_vec()), "application/pdf");
        assert!(matches!(result, Err(RenderError::Document(_))));
    }
}
