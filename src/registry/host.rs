//! Host document boundary
//!
//! The registry never touches host-page internals directly; it reads
//! [`AttachmentMarker`]s through the [`HostDocument`] trait. The
//! [`HtmlSnapshotDocument`] implementation scans a snapshot of host markup
//! with lol_html.

use std::cell::RefCell;

use async_trait::async_trait;
use html_escape::decode_html_entities;
use lol_html::{element, rewrite_str, text, RewriteStrSettings};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An attachment marker found in the host document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentMarker {
    /// Source URL of the thumbnail image
    pub thumbnail_url: String,
    /// Human-readable filename shown next to the thumbnail
    pub label: Option<String>,
}

impl AttachmentMarker {
    pub fn new(thumbnail_url: impl Into<String>, label: Option<&str>) -> Self {
        Self {
            thumbnail_url: thumbnail_url.into(),
            label: label.map(str::to_string),
        }
    }
}

/// Host document access errors
#[derive(Debug, Error)]
pub enum HostError {
    /// The host runtime invalidated our context; only a page reload helps
    #[error("Host context invalidated")]
    ContextInvalidated,

    #[error("Markup scan failed: {0}")]
    Markup(String),
}

/// Read access to the attachment markers of the live host document
#[async_trait]
pub trait HostDocument: Send + Sync {
    /// Markers currently present, in document order
    async fn markers(&self) -> Result<Vec<AttachmentMarker>, HostError>;
}

/// Selectors describing the host page's attachment markup
#[derive(Debug, Clone, Deserialize)]
pub struct MarkupSelectors {
    /// Selector for attachment containers
    pub container: String,
    /// Selector (inside a container) for the thumbnail image
    pub thumbnail: String,
    /// Selector (inside a container) for the filename label
    pub label: String,
}

impl Default for MarkupSelectors {
    fn default() -> Self {
        Self {
            container: "[data-attachment]".to_string(),
            thumbnail: "img[src]".to_string(),
            label: "[data-filename]".to_string(),
        }
    }
}

/// Scan host markup for attachment markers
///
/// Each container contributes at most one marker: its first thumbnail
/// image plus the concatenated text of its label elements. Containers
/// without a thumbnail are dropped.
pub fn scan_markup(html: &str, selectors: &MarkupSelectors) -> Result<Vec<AttachmentMarker>, HostError> {
    let found: RefCell<Vec<(Option<String>, String)>> = RefCell::new(Vec::new());

    let container_sel = selectors.container.clone();
    let thumbnail_sel = format!("{} {}", selectors.container, selectors.thumbnail);
    let label_sel = format!("{} {}", selectors.container, selectors.label);

    // The handler macros unwrap selector parsing; reject bad selectors first.
    for selector in [&container_sel, &thumbnail_sel, &label_sel] {
        selector
            .parse::<lol_html::Selector>()
            .map_err(|e| HostError::Markup(format!("Invalid selector '{}': {}", selector, e)))?;
    }

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!(container_sel, |_el| {
                    found.borrow_mut().push((None, String::new()));
                    Ok(())
                }),
                element!(thumbnail_sel, |el| {
                    if let Some(current) = found.borrow_mut().last_mut() {
                        if current.0.is_none() {
                            current.0 = el.get_attribute("src");
                        }
                    }
                    Ok(())
                }),
                text!(label_sel, |chunk| {
                    if let Some(current) = found.borrow_mut().last_mut() {
                        current.1.push_str(chunk.as_str());
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| HostError::Markup(e.to_string()))?;

    let markers = found
        .into_inner()
        .into_iter()
        .filter_map(|(src, label)| {
            let src = src?;
            // lol_html hands out raw attribute values and text
            let label = decode_html_entities(label.trim()).trim().to_string();
            Some(AttachmentMarker {
                thumbnail_url: decode_html_entities(&src).into_owned(),
                label: if label.is_empty() { None } else { Some(label) },
            })
        })
        .collect();

    Ok(markers)
}

#[derive(Debug, Default)]
struct Snapshot {
    markers: Vec<AttachmentMarker>,
    invalidated: bool,
}

/// Host document backed by the most recent markup snapshot
///
/// The companion control surface posts page markup whenever the host page
/// mutates; `markers` reflects the latest snapshot.
#[derive(Debug, Default)]
pub struct HtmlSnapshotDocument {
    selectors: MarkupSelectors,
    snapshot: RwLock<Snapshot>,
}

impl HtmlSnapshotDocument {
    pub fn new(selectors: MarkupSelectors) -> Self {
        Self {
            selectors,
            snapshot: RwLock::new(Snapshot::default()),
        }
    }

    /// Replace the snapshot with freshly scanned markup
    ///
    /// Returns the number of markers found.
    pub fn update_markup(&self, html: &str) -> Result<usize, HostError> {
        let markers = scan_markup(html, &self.selectors)?;
        let count = markers.len();
        self.replace_markers(markers);
        Ok(count)
    }

    /// Replace the snapshot with pre-extracted markers
    pub fn replace_markers(&self, markers: Vec<AttachmentMarker>) {
        let mut snapshot = self.snapshot.write();
        snapshot.markers = markers;
        snapshot.invalidated = false;
    }

    /// Mark the host context as invalidated
    pub fn invalidate(&self) {
        self.snapshot.write().invalidated = true;
    }
}

#[async_trait]
impl HostDocument for HtmlSnapshotDocument {
    async fn markers(&self) -> Result<Vec<AttachmentMarker>, HostError> {
        let snapshot = self.snapshot.read();
        if snapshot.invalidated {
            return Err(HostError::ContextInvalidated);
        }
        Ok(snapshot.markers.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <div class="thread">
          <div data-attachment>
            <img src="https://mail.example.com/?th=aaa111&amp;disp=thd">
            <span data-filename>Invoice March.pdf</span>
          </div>
          <div data-attachment>
            <img src="https://mail.example.com/?th=bbb222&amp;disp=thd">
          </div>
          <div data-attachment>
            <span data-filename>no thumbnail.txt</span>
          </div>
          <img src="https://mail.example.com/avatar.png">
        </div>
    "#;

    #[test]
    fn test_scan_markup_extracts_markers() {
        let markers = scan_markup(PAGE, &MarkupSelectors::default()).unwrap();

        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].thumbnail_url, "https://mail.example.com/?th=aaa111&disp=thd");
        assert_eq!(markers[0].label.as_deref(), Some("Invoice March.pdf"));
        assert_eq!(markers[1].label, None);
    }

    #[test]
    fn test_scan_markup_decodes_entities_once() {
        let page = r#"
            <div data-attachment>
              <img src="/att?th=ccc333&amp;disp=thd&amp;name=Caf&eacute;">
              <span data-filename>Q&amp;amp;A &#8217;24 &eacute;t&eacute;.pdf</span>
            </div>
        "#;
        let markers = scan_markup(page, &MarkupSelectors::default()).unwrap();

        assert_eq!(markers[0].thumbnail_url, "/att?th=ccc333&disp=thd&name=Café");
        assert_eq!(markers[0].label.as_deref(), Some("Q&amp;A \u{2019}24 été.pdf"));
    }

    #[tokio::test]
    async fn test_snapshot_document_invalidation() {
        let doc = HtmlSnapshotDocument::new(MarkupSelectors::default());
        assert_eq!(doc.update_markup(PAGE).unwrap(), 2);
        assert_eq!(doc.markers().await.unwrap().len(), 2);

        doc.invalidate();
        assert!(matches!(doc.markers().await, Err(HostError::ContextInvalidated)));

        doc.replace_markers(vec![AttachmentMarker::new("https://x/?th=c", None)]);
        assert_eq!(doc.markers().await.unwrap().len(), 1);
    }
}
