//! Viewer state

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::CacheEntry;
use crate::render::{ImageInfo, OpenDocument, RasterPolicy};
use crate::search::{DocumentLayout, ScrollAnimation, SearchEngine};

use super::notice::Notice;

/// Lifecycle of the viewer overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewerPhase {
    Closed,
    /// First load after opening from a thumbnail
    Opening,
    Open,
    /// Moving to another item; further navigation is ignored
    Navigating,
}

/// Zoom bounds and stepping
#[derive(Debug, Clone, Deserialize)]
pub struct ZoomConfig {
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub default: f32,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            min: 0.5,
            max: 4.0,
            step: 0.25,
            default: 1.0,
        }
    }
}

impl ZoomConfig {
    /// Snap to the step grid and clamp to the bounds
    pub fn normalize(&self, zoom: f32) -> f32 {
        if !zoom.is_finite() {
            return self.default;
        }
        let snapped = self.min + ((zoom - self.min) / self.step).round() * self.step;
        snapped.clamp(self.min, self.max)
    }

    pub fn zoom_in(&self, zoom: f32) -> f32 {
        self.normalize(zoom + self.step)
    }

    pub fn zoom_out(&self, zoom: f32) -> f32 {
        self.normalize(zoom - self.step)
    }
}

/// What the viewer surface is showing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ViewContent {
    Empty,
    Loading {
        filename: String,
    },
    #[serde(rename_all = "camelCase")]
    Document {
        filename: String,
        mime: String,
        page_count: usize,
    },
    Image {
        filename: String,
        image: ImageInfo,
    },
    /// Preview unavailable; the payload can still be downloaded
    #[serde(rename_all = "camelCase")]
    DownloadOnly {
        filename: String,
        mime: String,
        reason: String,
    },
    NoPreview {
        filename: String,
        mime: String,
    },
    LoadFailed {
        filename: String,
        reason: String,
    },
    ContextInvalidated,
}

/// Mutable viewer state, owned by the context behind a single lock
#[derive(Debug)]
pub(crate) struct ViewerState {
    pub phase: ViewerPhase,
    pub current: Option<usize>,
    pub current_hash: Option<String>,
    pub filename: Option<String>,
    pub zoom: f32,
    pub scroll_top: f32,
    pub viewport: (f32, f32),
    pub content: ViewContent,
    /// Payload on screen, kept alive independently of the cache
    pub entry: Option<Arc<CacheEntry>>,
    pub document: Option<OpenDocument>,
    pub search: SearchEngine,
    pub raster: RasterPolicy,
    pub scroll_animation: Option<ScrollAnimation>,
    pub notice: Option<Notice>,
    /// Bumped whenever the navigation UI must refresh
    pub nav_revision: u64,
    /// Identifies the foreground load whose result may be committed
    pub load_token: u64,
}

impl ViewerState {
    pub fn new(zoom: f32, viewport: (f32, f32), raster: RasterPolicy) -> Self {
        Self {
            phase: ViewerPhase::Closed,
            current: None,
            current_hash: None,
            filename: None,
            zoom,
            scroll_top: 0.0,
            viewport,
            content: ViewContent::Empty,
            entry: None,
            document: None,
            search: SearchEngine::new(),
            raster,
            scroll_animation: None,
            notice: None,
            nav_revision: 0,
            load_token: 0,
        }
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self.phase, ViewerPhase::Opening | ViewerPhase::Navigating)
    }

    /// Layout of the open document at the current zoom and viewport
    pub fn layout(&self, page_gap: f32) -> Option<DocumentLayout> {
        self.document
            .as_ref()
            .map(|doc| DocumentLayout::new(doc.pages.clone(), self.zoom, page_gap, self.viewport))
    }

    /// Drop everything tied to the displayed item
    pub fn clear_item(&mut self) {
        self.entry = None;
        self.document = None;
        self.search.clear();
        self.raster.reset();
        self.scroll_top = 0.0;
        self.scroll_animation = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_steps_and_bounds() {
        let zoom = ZoomConfig::default();
        assert_eq!(zoom.zoom_in(1.0), 1.25);
        assert_eq!(zoom.zoom_out(1.0), 0.75);
        assert_eq!(zoom.zoom_in(4.0), 4.0);
        assert_eq!(zoom.zoom_out(0.5), 0.5);
    }

    #[test]
    fn test_zoom_normalize_snaps_to_grid() {
        let zoom = ZoomConfig::default();
        assert_eq!(zoom.normalize(1.3), 1.25);
        assert_eq!(zoom.normalize(1.4), 1.5);
        assert_eq!(zoom.normalize(9.0), 4.0);
        assert_eq!(zoom.normalize(0.0), 0.5);
        assert_eq!(zoom.normalize(f32::NAN), 1.0);
    }

    #[test]
    fn test_view_content_serialization() {
        let content = ViewContent::Document {
            filename: "a.pdf".into(),
            mime: "application/pdf".into(),
            page_count: 2,
        };
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["kind"], "document");
        assert_eq!(json["pageCount"], 2);

        let json = serde_json::to_value(ViewContent::ContextInvalidated).unwrap();
        assert_eq!(json["kind"], "contextInvalidated");
    }
}
