//! Attachment registry
//!
//! Keeps a deduplicated, order-stable view of the attachments currently
//! present in the host document. Records are keyed by content hash; a
//! rescan reconciles the registry against the live document.

mod host;
mod identity;

use std::collections::{HashMap, HashSet};

use serde::Serialize;

pub use host::{
    scan_markup, AttachmentMarker, HostDocument, HostError, HtmlSnapshotDocument, MarkupSelectors,
};
pub use identity::IdentityRules;

/// Labels shorter than this are replaced by a synthesized name
const MIN_LABEL_CHARS: usize = 3;
/// Hash prefix length used in synthesized names
const NAME_HASH_PREFIX: usize = 8;

/// An attachment discovered in the host document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRecord {
    /// Stable identity extracted from the thumbnail URL
    pub content_hash: String,
    /// Thumbnail URL as found in the document
    pub source_url: String,
    /// URL of the full attachment
    pub full_url: String,
    /// Display name (host label or synthesized)
    pub display_name: String,
    /// Position in the registry sequence
    pub ordinal: usize,
}

/// Outcome of a rescan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RescanReport {
    /// Hashes appended by this rescan
    pub added: Vec<String>,
    /// Hashes purged by this rescan
    pub removed: Vec<String>,
    /// Number of records after the rescan
    pub count: usize,
    /// Whether the record count changed
    pub count_changed: bool,
}

/// Derive a display name from the host label
pub fn display_name(label: Option<&str>, content_hash: &str) -> String {
    match label.map(str::trim) {
        Some(label) if label.chars().count() >= MIN_LABEL_CHARS => label.to_string(),
        _ => {
            let prefix: String = content_hash.chars().take(NAME_HASH_PREFIX).collect();
            format!("Attachment {}", prefix)
        }
    }
}

/// Deduplicated, order-stable attachment registry
#[derive(Debug, Default)]
pub struct AttachmentRegistry {
    rules: IdentityRules,
    records: Vec<AttachmentRecord>,
    by_hash: HashMap<String, usize>,
}

impl AttachmentRegistry {
    pub fn new(rules: IdentityRules) -> Self {
        Self {
            rules,
            records: Vec::new(),
            by_hash: HashMap::new(),
        }
    }

    /// Reconcile the registry against the markers of the live document
    ///
    /// Persisting hashes keep their relative order and are refreshed in
    /// place; new hashes are appended in document order; vanished hashes
    /// are purged. Markers without a resolvable identity are skipped.
    pub fn reconcile(&mut self, markers: &[AttachmentMarker]) -> RescanReport {
        let previous_count = self.records.len();

        let mut seen = HashSet::new();
        let mut discovered: Vec<AttachmentRecord> = Vec::new();
        for marker in markers {
            let Some(hash) = self.rules.extract_hash(&marker.thumbnail_url) else {
                tracing::debug!(url = %marker.thumbnail_url, "Skipping marker without identity");
                continue;
            };
            if !seen.insert(hash.clone()) {
                continue;
            }
            discovered.push(AttachmentRecord {
                full_url: self.rules.full_view_url(&marker.thumbnail_url),
                display_name: display_name(marker.label.as_deref(), &hash),
                source_url: marker.thumbnail_url.clone(),
                content_hash: hash,
                ordinal: 0,
            });
        }

        let mut fresh: HashMap<String, AttachmentRecord> = discovered
            .iter()
            .map(|record| (record.content_hash.clone(), record.clone()))
            .collect();

        let mut removed = Vec::new();
        let mut next: Vec<AttachmentRecord> = Vec::with_capacity(discovered.len());
        for record in self.records.drain(..) {
            match fresh.remove(&record.content_hash) {
                Some(update) => next.push(update),
                None => removed.push(record.content_hash),
            }
        }

        let mut added = Vec::new();
        for record in discovered {
            if fresh.contains_key(&record.content_hash) {
                added.push(record.content_hash.clone());
                next.push(record);
            }
        }

        self.by_hash.clear();
        for (ordinal, record) in next.iter_mut().enumerate() {
            record.ordinal = ordinal;
            self.by_hash.insert(record.content_hash.clone(), ordinal);
        }
        self.records = next;

        RescanReport {
            added,
            removed,
            count: self.records.len(),
            count_changed: self.records.len() != previous_count,
        }
    }

    pub fn records(&self) -> &[AttachmentRecord] {
        &self.records
    }

    pub fn get(&self, ordinal: usize) -> Option<&AttachmentRecord> {
        self.records.get(ordinal)
    }

    pub fn get_by_hash(&self, hash: &str) -> Option<&AttachmentRecord> {
        self.by_hash.get(hash).and_then(|&ordinal| self.records.get(ordinal))
    }

    pub fn ordinal_of(&self, hash: &str) -> Option<usize> {
        self.by_hash.get(hash).copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
