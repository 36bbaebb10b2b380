//! Text layer types
//!
//! Positioned text extracted from a paginated document, one layer per page.
//! Coordinates are in page points with the origin at the top-left corner.

use serde::{Deserialize, Serialize};

/// Rectangle in page points or screen pixels, origin top-left
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }
}

/// Horizontal extent of a single character
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharBox {
    pub ch: char,
    pub x: f32,
    pub width: f32,
}

/// A contiguous run of text at one position on a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRun {
    pub text: String,
    /// Bounding box of the whole run
    pub bbox: Rect,
    /// Per-character boxes, when the extractor provides them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_boxes: Option<Vec<CharBox>>,
}

impl TextRun {
    pub fn new(text: impl Into<String>, bbox: Rect) -> Self {
        Self {
            text: text.into(),
            bbox,
            char_boxes: None,
        }
    }

    pub fn with_char_boxes(mut self, boxes: Vec<CharBox>) -> Self {
        self.char_boxes = Some(boxes);
        self
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Text layer for a single page
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLayer {
    /// Page number (1-indexed)
    pub page: usize,
    /// Page width in points
    pub width: f32,
    /// Page height in points
    pub height: f32,
    pub runs: Vec<TextRun>,
}

impl TextLayer {
    pub fn new(page: usize, width: f32, height: f32) -> Self {
        Self {
            page,
            width,
            height,
            runs: Vec::new(),
        }
    }

    pub fn with_run(mut self, run: TextRun) -> Self {
        self.runs.push(run);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_run_char_count_is_unicode_aware() {
        let run = TextRun::new("Café", Rect::default());
        assert_eq!(run.char_count(), 4);
    }

    #[test]
    fn test_text_layer_serialization() {
        let layer = TextLayer::new(1, 612.0, 792.0)
            .with_run(TextRun::new("Total", Rect::new(72.0, 100.0, 30.0, 12.0)));
        let json = serde_json::to_string(&layer).unwrap();
        assert!(json.contains("\"page\":1"));
        assert!(!json.contains("charBoxes"));
    }
}
