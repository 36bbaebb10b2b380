//! Attachment identity extraction
//!
//! Thumbnail URLs in the host page encode a content-addressable identifier
//! and an action mode (thumbnail vs. full view). These helpers pull the
//! identifier out and derive the full-view URL from a thumbnail URL.

use reqwest::Url;
use serde::Deserialize;

/// Minimum length of a hex path segment accepted as a fallback identity
const MIN_HEX_SEGMENT_LEN: usize = 16;

/// Rules describing how the host page encodes attachment identity
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityRules {
    /// Query parameter carrying the content hash
    pub hash_param: String,
    /// Query parameter carrying the action mode
    pub mode_param: String,
    /// Mode value used by thumbnail URLs
    pub thumbnail_mode: String,
    /// Mode value requesting the full attachment
    pub full_mode: String,
    /// Base URL used to resolve relative thumbnail URLs
    pub base_url: Option<String>,
}

impl Default for IdentityRules {
    fn default() -> Self {
        Self {
            hash_param: "th".to_string(),
            mode_param: "disp".to_string(),
            thumbnail_mode: "thd".to_string(),
            full_mode: "inline".to_string(),
            base_url: None,
        }
    }
}

impl IdentityRules {
    /// Parse a thumbnail URL, resolving it against `base_url` when relative
    pub fn parse_url(&self, raw: &str) -> Option<Url> {
        match Url::parse(raw) {
            Ok(url) => Some(url),
            Err(_) => {
                let base = Url::parse(self.base_url.as_deref()?).ok()?;
                base.join(raw).ok()
            }
        }
    }

    /// Extract the stable content hash from a thumbnail URL
    ///
    /// Returns `None` when the URL carries no resolvable identity.
    pub fn extract_hash(&self, raw: &str) -> Option<String> {
        let url = self.parse_url(raw)?;

        let from_query = url
            .query_pairs()
            .find(|(key, _)| key == self.hash_param.as_str())
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| is_valid_hash(value));

        from_query.or_else(|| {
            url.path_segments()?
                .filter(|segment| !segment.is_empty())
                .last()
                .filter(|segment| {
                    segment.len() >= MIN_HEX_SEGMENT_LEN
                        && segment.chars().all(|c| c.is_ascii_hexdigit())
                })
                .map(|segment| segment.to_ascii_lowercase())
        })
    }

    /// Derive the full-view URL from a thumbnail URL
    ///
    /// The mode parameter is switched from the thumbnail value to the full
    /// value. URLs without a thumbnail mode are returned resolved but
    /// otherwise unchanged.
    pub fn full_view_url(&self, raw: &str) -> String {
        let Some(mut url) = self.parse_url(raw) else {
            return raw.to_string();
        };

        let is_thumbnail = url
            .query_pairs()
            .any(|(key, value)| key == self.mode_param.as_str() && value == self.thumbnail_mode.as_str());
        if !is_thumbnail {
            return url.to_string();
        }

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(key, value)| {
                if key == self.mode_param.as_str() {
                    (key.into_owned(), self.full_mode.clone())
                } else {
                    (key.into_owned(), value.into_owned())
                }
            })
            .collect();

        url.query_pairs_mut().clear().extend_pairs(pairs);
        url.to_string()
    }
}

fn is_valid_hash(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const THUMB: &str =
        "https://mail.example.com/mail/u/0?ui=2&th=18c2f0a9b1d4e7f3&attid=0.1&disp=thd&view=att";

    #[test]
    fn test_extract_hash_from_query() {
        let rules = IdentityRules::default();
        assert_eq!(rules.extract_hash(THUMB).as_deref(), Some("18c2f0a9b1d4e7f3"));
    }

    #[test]
    fn test_extract_hash_from_hex_path_segment() {
        let rules = IdentityRules::default();
        let url = "https://cdn.example.com/files/A1B2C3D4E5F60718293a/";
        assert_eq!(rules.extract_hash(url).as_deref(), Some("a1b2c3d4e5f60718293a"));
    }

    #[test]
    fn test_extract_hash_missing() {
        let rules = IdentityRules::default();
        assert_eq!(rules.extract_hash("https://example.com/img/logo.png"), None);
        assert_eq!(rules.extract_hash("https://example.com/?th="), None);
        assert_eq!(rules.extract_hash("not a url"), None);
    }

    #[test]
    fn test_relative_url_needs_base() {
        let mut rules = IdentityRules::default();
        assert_eq!(rules.extract_hash("/mail?th=abc123&disp=thd"), None);

        rules.base_url = Some("https://mail.example.com/".to_string());
        assert_eq!(rules.extract_hash("/mail?th=abc123&disp=thd").as_deref(), Some("abc123"));
    }

    #[test]
    fn test_full_view_url_switches_mode() {
        let rules = IdentityRules::default();
        let full = rules.full_view_url(THUMB);
        assert!(full.contains("disp=inline"));
        assert!(!full.contains("disp=thd"));
        assert!(full.contains("th=18c2f0a9b1d4e7f3"));
        assert!(full.contains("attid=0.1"));
    }

    #[test]
    fn test_full_view_url_without_mode_is_unchanged() {
        let rules = IdentityRules::default();
        let url = "https://example.com/file?th=abc";
        assert_eq!(rules.full_view_url(url), url);
    }
}
