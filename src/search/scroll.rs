//! Smooth scrolling towards the active match

use serde::Serialize;
use tokio::time::Duration;

/// Scroll offset that puts `center_y` in the middle of the viewport,
/// clamped to the scrollable range.
pub fn centered_scroll_top(center_y: f32, viewport_height: f32, content_height: f32) -> f32 {
    let max_top = (content_height - viewport_height).max(0.0);
    (center_y - viewport_height / 2.0).clamp(0.0, max_top)
}

/// Cubic ease-in-out over `t` in `[0, 1]`
pub fn ease_in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// Fixed-duration eased scroll between two offsets
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollAnimation {
    pub from: f32,
    pub to: f32,
    pub duration_ms: u64,
}

impl ScrollAnimation {
    pub fn new(from: f32, to: f32, duration: Duration) -> Self {
        Self {
            from,
            to,
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Scroll offset `elapsed` after the animation started
    pub fn position_at(&self, elapsed: Duration) -> f32 {
        if self.duration_ms == 0 {
            return self.to;
        }
        let t = elapsed.as_millis() as f32 / self.duration_ms as f32;
        self.from + (self.to - self.from) * ease_in_out_cubic(t)
    }

    pub fn is_finished(&self, elapsed: Duration) -> bool {
        elapsed.as_millis() as u64 >= self.duration_ms
    }
}
