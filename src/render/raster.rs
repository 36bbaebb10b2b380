//! Raster quality policy for zoomed documents
//!
//! Up to the quality threshold, zoom is a pure visual scale of the existing
//! raster. Above it, pages are re-rasterized at the new zoom once the zoom
//! has settled (debounced), and only when it moved far enough from the
//! zoom the current raster was made at.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct RasterConfig {
    /// Zoom above which re-rasterization is considered
    pub quality_threshold: f32,
    /// Smallest zoom change that triggers a new raster
    pub min_delta: f32,
    /// Quiet period before re-rasterizing
    pub debounce_ms: u64,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            quality_threshold: 1.5,
            min_delta: 0.5,
            debounce_ms: 500,
        }
    }
}

/// What a zoom change does to the page rasters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ZoomEffect {
    /// Scale the existing raster visually
    VisualScale { css_scale: f32 },
    /// Scale visually now, re-rasterize after the debounce
    ScheduleRerender { css_scale: f32 },
}

#[derive(Debug, Clone)]
pub struct RasterPolicy {
    config: RasterConfig,
    raster_zoom: f32,
    generation: u64,
}

impl RasterPolicy {
    pub fn new(config: RasterConfig) -> Self {
        Self {
            config,
            raster_zoom: 1.0,
            generation: 0,
        }
    }

    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    /// Zoom the current rasters were produced at
    pub fn raster_zoom(&self) -> f32 {
        self.raster_zoom
    }

    /// Bumped every time pages are re-rasterized
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Visual scale applied on top of the current raster
    pub fn css_scale(&self, zoom: f32) -> f32 {
        zoom / self.raster_zoom
    }

    pub fn on_zoom(&self, zoom: f32) -> ZoomEffect {
        let css_scale = self.css_scale(zoom);
        if zoom > self.config.quality_threshold {
            ZoomEffect::ScheduleRerender { css_scale }
        } else {
            ZoomEffect::VisualScale { css_scale }
        }
    }

    /// Whether a settled zoom warrants a fresh raster
    pub fn needs_rerender(&self, zoom: f32) -> bool {
        zoom > self.config.quality_threshold
            && (zoom - self.raster_zoom).abs() >= self.config.min_delta
    }

    /// Record a re-rasterization at `zoom`; returns the new generation
    pub fn mark_rastered(&mut self, zoom: f32) -> u64 {
        self.raster_zoom = zoom;
        self.generation += 1;
        self.generation
    }

    /// Back to the initial raster, e.g. for a newly opened document
    pub fn reset(&mut self) {
        self.raster_zoom = 1.0;
        self.generation = 0;
    }
}

impl Default for RasterPolicy {
    fn default() -> Self {
        Self::new(RasterConfig::default())
    }
}
