//! Out-of-band notices shown above the host page

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticeKind {
    ContextInvalidated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticeAction {
    /// Reload the host page
    Reload,
}

/// Dismissible banner
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub action: NoticeAction,
    pub raised_at: DateTime<Utc>,
}

impl Notice {
    pub fn context_invalidated() -> Self {
        Self {
            kind: NoticeKind::ContextInvalidated,
            message: "The attachment viewer was updated or restarted. Reload the page to keep using it."
                .to_string(),
            action: NoticeAction::Reload,
            raised_at: Utc::now(),
        }
    }
}
