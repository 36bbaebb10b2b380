//! UI intents
//!
//! The viewer surface reports user input as `ViewerIntent` messages; the
//! context interprets them against its current state.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ViewerIntent {
    /// A thumbnail in the host page was clicked
    ThumbnailClick { hash: String },
    Open { ordinal: usize },
    Next,
    Previous,
    Goto { ordinal: usize },
    Close,
    ZoomIn,
    ZoomOut,
    ZoomReset,
    SetZoom { zoom: f32 },
    SearchInput { query: String },
    SearchNext,
    SearchPrevious,
    SearchClear,
    Resize { width: f32, height: f32 },
    Scroll { top: f32 },
    Key {
        key: String,
        #[serde(default)]
        shift: bool,
    },
    Download,
    DismissNotice,
}

/// Viewer command bound to a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    Close,
    ClearSearch,
    Next,
    Previous,
    ZoomIn,
    ZoomOut,
    ZoomReset,
    SearchNext,
    SearchPrevious,
}

/// Map a key press (DOM `KeyboardEvent.key` names) to a command
///
/// Escape clears an active search before it closes the viewer. Enter only
/// steps through matches while a search is active.
pub fn key_command(key: &str, shift: bool, search_active: bool) -> Option<KeyCommand> {
    match key {
        "Escape" if search_active => Some(KeyCommand::ClearSearch),
        "Escape" => Some(KeyCommand::Close),
        "ArrowRight" => Some(KeyCommand::Next),
        "ArrowLeft" => Some(KeyCommand::Previous),
        "+" | "=" => Some(KeyCommand::ZoomIn),
        "-" => Some(KeyCommand::ZoomOut),
        "0" => Some(KeyCommand::ZoomReset),
        "Enter" if search_active && shift => Some(KeyCommand::SearchPrevious),
        "Enter" if search_active => Some(KeyCommand::SearchNext),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_wire_format() {
        let intent: ViewerIntent =
            serde_json::from_str(r#"{"type":"thumbnailClick","hash":"abc"}"#).unwrap();
        assert_eq!(intent, ViewerIntent::ThumbnailClick { hash: "abc".into() });

        let intent: ViewerIntent = serde_json::from_str(r#"{"type":"key","key":"Enter"}"#).unwrap();
        assert_eq!(
            intent,
            ViewerIntent::Key {
                key: "Enter".into(),
                shift: false
            }
        );

        let intent: ViewerIntent = serde_json::from_str(r#"{"type":"zoomIn"}"#).unwrap();
        assert_eq!(intent, ViewerIntent::ZoomIn);
    }

    #[test]
    fn test_escape_clears_search_first() {
        assert_eq!(key_command("Escape", false, true), Some(KeyCommand::ClearSearch));
        assert_eq!(key_command("Escape", false, false), Some(KeyCommand::Close));
    }

    #[test]
    fn test_enter_steps_matches_only_while_searching() {
        assert_eq!(key_command("Enter", false, true), Some(KeyCommand::SearchNext));
        assert_eq!(key_command("Enter", true, true), Some(KeyCommand::SearchPrevious));
        assert_eq!(key_command("Enter", false, false), None);
    }

    #[test]
    fn test_navigation_and_zoom_keys() {
        assert_eq!(key_command("ArrowRight", false, false), Some(KeyCommand::Next));
        assert_eq!(key_command("ArrowLeft", false, true), Some(KeyCommand::Previous));
        assert_eq!(key_command("=", false, false), Some(KeyCommand::ZoomIn));
        assert_eq!(key_command("-", false, false), Some(KeyCommand::ZoomOut));
        assert_eq!(key_command("0", false, false), Some(KeyCommand::ZoomReset));
        assert_eq!(key_command("q", false, false), None);
    }
}
