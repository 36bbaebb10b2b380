//! Highlight geometry and document layout
//!
//! Match rectangles are computed in page points, then projected onto the
//! scrollable viewer surface for the current zoom.

use serde::{Deserialize, Serialize};

use super::text_layer::{Rect, TextRun};

/// Page rectangle of a character range within a run
///
/// Uses the run's per-character boxes when they line up with its text.
/// Otherwise the position is estimated by spreading the run's width evenly
/// over its characters, which is close but not pixel-exact.
///
/// Returns the rectangle and whether it is precise.
pub fn match_rect(run: &TextRun, offset: usize, length: usize) -> (Rect, bool) {
    let char_count = run.char_count();

    if let Some(boxes) = &run.char_boxes {
        if boxes.len() == char_count && length > 0 && offset + length <= char_count {
            let first = &boxes[offset];
            let last = &boxes[offset + length - 1];
            let x = first.x.min(last.x);
            let right = (first.x + first.width).max(last.x + last.width);
            return (Rect::new(x, run.bbox.y, right - x, run.bbox.height), true);
        }
    }

    let char_width = if char_count == 0 {
        0.0
    } else {
        run.bbox.width / char_count as f32
    };

    (
        Rect::new(
            run.bbox.x + char_width * offset as f32,
            run.bbox.y,
            char_width * length as f32,
            run.bbox.height,
        ),
        false,
    )
}

/// Page size in points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// Vertical stack of pages as laid out on the viewer surface
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentLayout {
    pub pages: Vec<PageSize>,
    pub zoom: f32,
    /// Gap between pages (and above the first page), in pixels
    pub page_gap: f32,
    pub viewport_width: f32,
    pub viewport_height: f32,
}

impl DocumentLayout {
    pub fn new(pages: Vec<PageSize>, zoom: f32, page_gap: f32, viewport: (f32, f32)) -> Self {
        Self {
            pages,
            zoom,
            page_gap,
            viewport_width: viewport.0,
            viewport_height: viewport.1,
        }
    }

    /// Top edge of a page (1-indexed) on the surface
    pub fn page_top(&self, page: usize) -> f32 {
        self.pages
            .iter()
            .take(page.saturating_sub(1))
            .fold(self.page_gap, |top, size| top + size.height * self.zoom + self.page_gap)
    }

    /// Left edge of a page (1-indexed); pages are centred horizontally
    pub fn page_left(&self, page: usize) -> f32 {
        let width = self
            .pages
            .get(page.saturating_sub(1))
            .map(|size| size.width * self.zoom)
            .unwrap_or(0.0);
        ((self.viewport_width - width) / 2.0).max(0.0)
    }

    /// Total scrollable height
    pub fn content_height(&self) -> f32 {
        self.page_top(self.pages.len() + 1)
    }

    /// Project a page rectangle onto the surface
    pub fn to_screen(&self, page: usize, rect: &Rect) -> Rect {
        Rect::new(
            self.page_left(page) + rect.x * self.zoom,
            self.page_top(page) + rect.y * self.zoom,
            rect.width * self.zoom,
            rect.height * self.zoom,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::text_layer::CharBox;
    use super::*;

    fn run() -> TextRun {
        TextRun::new("Total Due", Rect::new(100.0, 50.0, 90.0, 12.0))
    }

    #[test]
    fn test_fallback_estimates_from_width() {
        let (rect, precise) = match_rect(&run(), 6, 3);
        assert!(!precise);
        assert_eq!(rect, Rect::new(160.0, 50.0, 30.0, 12.0));
    }

    #[test]
    fn test_precise_uses_char_boxes() {
        let boxes: Vec<CharBox> = "Total Due"
            .chars()
            .enumerate()
            .map(|(i, ch)| CharBox {
                ch,
                x: 100.0 + i as f32 * 8.0,
                width: 7.0,
            })
            .collect();
        let run = run().with_char_boxes(boxes);

        let (rect, precise) = match_rect(&run, 6, 3);
        assert!(precise);
        assert_eq!(rect, Rect::new(148.0, 50.0, 23.0, 12.0));
    }

    #[test]
    fn test_misaligned_char_boxes_fall_back() {
        let run = run().with_char_boxes(vec![CharBox {
            ch: 'T',
            x: 100.0,
            width: 7.0,
        }]);
        let (_, precise) = match_rect(&run, 0, 5);
        assert!(!precise);
    }

    #[test]
    fn test_layout_stacks_pages() {
        let pages = vec![
            PageSize {
                width: 600.0,
                height: 800.0,
            },
            PageSize {
                width: 600.0,
                height: 800.0,
            },
        ];
        let layout = DocumentLayout::new(pages, 1.0, 10.0, (800.0, 600.0));

        assert_eq!(layout.page_top(1), 10.0);
        assert_eq!(layout.page_top(2), 820.0);
        assert_eq!(layout.content_height(), 1630.0);
        assert_eq!(layout.page_left(1), 100.0);

        let zoomed = DocumentLayout {
            zoom: 2.0,
            ..layout.clone()
        };
        assert_eq!(zoomed.page_top(2), 1610.0);
        assert_eq!(zoomed.page_left(1), 0.0);
        assert_eq!(
            zoomed.to_screen(2, &Rect::new(10.0, 10.0, 5.0, 5.0)),
            Rect::new(20.0, 1630.0, 10.0, 10.0)
        );
    }
}
