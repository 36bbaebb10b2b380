//! Renderer dispatch
//!
//! Picks the rendering path for a cached payload from its content kind:
//!
//! - documents are opened with the configured `DocumentEngine`, which
//!   yields page geometry and text layers for search;
//! - images are shown natively;
//! - anything else gets a "no preview" message.
//!
//! When no engine is configured, or the engine fails, a document falls back
//! to download only.

mod engine;
mod image_view;
#[cfg(feature = "mupdf")]
mod mupdf_engine;
mod raster;

use std::fmt;
use std::sync::Arc;

use tokio::time::{timeout, Duration};

use crate::cache::{CacheEntry, ContentKind};
use crate::search::{PageSize, TextLayer};

pub use engine::{encode_png, DocumentEngine, PagedDocument, RasterPage, RenderError, RenderResult};
pub use image_view::{describe as describe_image, ImageInfo};
#[cfg(feature = "mupdf")]
pub use mupdf_engine::{MupdfDocument, MupdfEngine};
pub use raster::{RasterConfig, RasterPolicy, ZoomEffect};

#[cfg(test)]
pub(crate) use engine::testing;

/// A document opened for viewing
#[derive(Clone)]
pub struct OpenDocument {
    pub document: Arc<dyn PagedDocument>,
    pub pages: Vec<PageSize>,
    /// One layer per page, in page order
    pub text_layers: Vec<TextLayer>,
}

impl fmt::Debug for OpenDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenDocument")
            .field("pages", &self.pages.len())
            .finish_non_exhaustive()
    }
}

/// Outcome of rendering a payload
#[derive(Debug, Clone)]
pub enum RenderedView {
    Document(OpenDocument),
    Image(ImageInfo),
    DownloadOnly { reason: String },
    NoPreview { mime: String },
}

pub struct RendererDispatch {
    engine: Option<Arc<dyn DocumentEngine>>,
    timeout_secs: u64,
}

impl RendererDispatch {
    pub fn new(engine: Option<Arc<dyn DocumentEngine>>, timeout_secs: u64) -> Self {
        Self {
            engine,
            timeout_secs,
        }
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    pub async fn render(&self, entry: &CacheEntry) -> RenderedView {
        match entry.kind() {
            ContentKind::Image => RenderedView::Image(describe_image(&entry.bytes, &entry.mime)),
            ContentKind::Document => match self.open_document(entry).await {
                Ok(doc) => RenderedView::Document(doc),
                Err(e) => {
                    tracing::warn!(hash = %entry.key.hash, error = %e, "Document preview unavailable");
                    RenderedView::DownloadOnly {
                        reason: e.to_string(),
                    }
                }
            },
            ContentKind::Unsupported => RenderedView::NoPreview {
                mime: entry.mime.clone(),
            },
        }
    }

    /// Open a document payload and extract its geometry and text layers
    ///
    /// A page whose text cannot be extracted gets an empty layer rather
    /// than failing the whole document.
    pub async fn open_document(&self, entry: &CacheEntry) -> RenderResult<OpenDocument> {
        let engine = self
            .engine
            .clone()
            .filter(|engine| engine.accepts(&entry.mime))
            .ok_or_else(|| RenderError::Unsupported(entry.mime.clone()))?;

        let bytes = Arc::clone(&entry.bytes);
        let mime = entry.mime.clone();

        self.blocking(move || {
            let document = engine.open(bytes, &mime)?;
            let count = document.page_count();

            let mut pages = Vec::with_capacity(count);
            let mut text_layers = Vec::with_capacity(count);
            for page in 1..=count {
                let size = document.page_size(page)?;
                let layer = document.text_layer(page).unwrap_or_else(|e| {
                    tracing::debug!(page, error = %e, "Text layer unavailable");
                    TextLayer::new(page, size.width, size.height)
                });
                pages.push(size);
                text_layers.push(layer);
            }

            Ok(OpenDocument {
                document,
                pages,
                text_layers,
            })
        })
        .await
    }

    pub async fn rasterize(&self, doc: &OpenDocument, page: usize, scale: f32) -> RenderResult<RasterPage> {
        let document = Arc::clone(&doc.document);
        self.blocking(move || document.rasterize(page, scale)).await
    }

    async fn blocking<F, R>(&self, f: F) -> RenderResult<R>
    where
        F: FnOnce() -> RenderResult<R> + Send + 'static,
        R: Send + 'static,
    {
        timeout(
            Duration::from_secs(self.timeout_secs),
            tokio::task::spawn_blocking(f),
        )
        .await
        .map_err(|_| RenderError::Timeout(self.timeout_secs))?
        .map_err(|e| RenderError::Join(e.to_string()))?
    }
}
