//! In-document text search
//!
//! Searches the text layers of an open document, keeps the ordered match
//! list with one active match, and maintains highlight rectangles for the
//! current layout.
//!
//! Matching is case-insensitive. After a hit, scanning resumes one
//! character later, so overlapping occurrences are all reported.

mod geometry;
mod scroll;
mod text_layer;

use serde::Serialize;
use tokio::time::Duration;

pub use geometry::{match_rect, DocumentLayout, PageSize};
pub use scroll::{centered_scroll_top, ease_in_out_cubic, ScrollAnimation};
pub use text_layer::{CharBox, Rect, TextLayer, TextRun};

/// Characters of context on each side of a match excerpt
const EXCERPT_CONTEXT: usize = 30;

/// A single occurrence of the query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    /// Page number (1-indexed)
    pub page: usize,
    /// Index of the run within the page's text layer
    pub run: usize,
    /// Character offset within the run
    pub offset: usize,
    /// Length in characters
    pub length: usize,
    pub excerpt: String,
    /// Highlight rectangle in page points
    pub page_rect: Rect,
    /// Whether `page_rect` comes from per-character geometry
    pub precise: bool,
}

/// Highlight of a match on the viewer surface
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub index: usize,
    pub rect: Rect,
    pub active: bool,
}

/// Serializable view of the search state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSnapshot {
    pub query: String,
    pub total: usize,
    /// Index of the active match
    pub active: Option<usize>,
    pub highlights: Vec<Highlight>,
}

/// Case fold used for matching; one char in, one char out
fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Find every occurrence of `query` in the given text layers
///
/// Results are ordered by page, then run, then offset. A blank query
/// yields no matches.
pub fn find_matches(query: &str, layers: &[TextLayer]) -> Vec<SearchMatch> {
    let needle: Vec<char> = query.trim().chars().map(fold).collect();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut ordered: Vec<&TextLayer> = layers.iter().collect();
    ordered.sort_by_key(|layer| layer.page);

    let mut matches = Vec::new();
    for layer in ordered {
        for (run_index, run) in layer.runs.iter().enumerate() {
            let chars: Vec<char> = run.text.chars().collect();
            let folded: Vec<char> = chars.iter().copied().map(fold).collect();
            if folded.len() < needle.len() {
                continue;
            }

            for (offset, window) in folded.windows(needle.len()).enumerate() {
                if window != needle.as_slice() {
                    continue;
                }
                let (page_rect, precise) = match_rect(run, offset, needle.len());
                matches.push(SearchMatch {
                    page: layer.page,
                    run: run_index,
                    offset,
                    length: needle.len(),
                    excerpt: excerpt(&chars, offset, needle.len()),
                    page_rect,
                    precise,
                });
            }
        }
    }
    matches
}

fn excerpt(chars: &[char], offset: usize, length: usize) -> String {
    let start = offset.saturating_sub(EXCERPT_CONTEXT);
    let end = (offset + length + EXCERPT_CONTEXT).min(chars.len());

    let mut out = String::new();
    if start > 0 {
        out.push_str("...");
    }
    out.extend(&chars[start..end]);
    if end < chars.len() {
        out.push_str("...");
    }
    out
}

/// Search state for the open document
#[derive(Debug, Clone, Default)]
pub struct SearchEngine {
    query: String,
    matches: Vec<SearchMatch>,
    highlights: Vec<Highlight>,
    active: Option<usize>,
}

impl SearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a search, replacing any previous results
    ///
    /// The first match becomes active. Returns the match count.
    pub fn search(&mut self, query: &str, layers: &[TextLayer], layout: &DocumentLayout) -> usize {
        self.query = query.trim().to_string();
        self.matches = find_matches(query, layers);
        self.active = if self.matches.is_empty() { None } else { Some(0) };
        self.relayout(layout);

        tracing::debug!(query = %self.query, total = self.matches.len(), "Search completed");
        self.matches.len()
    }

    /// Recompute highlight rectangles, e.g. after a zoom change
    pub fn relayout(&mut self, layout: &DocumentLayout) {
        self.highlights = self
            .matches
            .iter()
            .enumerate()
            .map(|(index, m)| Highlight {
                index,
                rect: layout.to_screen(m.page, &m.page_rect),
                active: self.active == Some(index),
            })
            .collect();
    }

    /// Advance to the next match, wrapping to the first
    pub fn next(&mut self) -> Option<usize> {
        let total = self.matches.len();
        if total == 0 {
            return None;
        }
        let next = self.active.map_or(0, |i| (i + 1) % total);
        self.set_active(next);
        Some(next)
    }

    /// Step back to the previous match, wrapping to the last
    pub fn previous(&mut self) -> Option<usize> {
        let total = self.matches.len();
        if total == 0 {
            return None;
        }
        let previous = self.active.map_or(total - 1, |i| (i + total - 1) % total);
        self.set_active(previous);
        Some(previous)
    }

    fn set_active(&mut self, index: usize) {
        self.active = Some(index);
        for highlight in &mut self.highlights {
            highlight.active = highlight.index == index;
        }
    }

    /// Scroll animation that centres the active match in the viewport
    pub fn scroll_to_active(
        &self,
        from: f32,
        layout: &DocumentLayout,
        duration: Duration,
    ) -> Option<ScrollAnimation> {
        let highlight = self.highlights.get(self.active?)?;
        let to = centered_scroll_top(
            highlight.rect.center_y(),
            layout.viewport_height,
            layout.content_height(),
        );
        Some(ScrollAnimation::new(from, to, duration))
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_active(&self) -> bool {
        !self.query.is_empty()
    }

    pub fn matches(&self) -> &[SearchMatch] {
        &self.matches
    }

    pub fn highlights(&self) -> &[Highlight] {
        &self.highlights
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn snapshot(&self) -> SearchSnapshot {
        SearchSnapshot {
            query: self.query.clone(),
            total: self.matches.len(),
            active: self.active,
            highlights: self.highlights.clone(),
        }
    }
}
