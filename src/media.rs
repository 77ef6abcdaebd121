//! Media references and resource locators.
//!
//! A [`MediaRef`] identifies one reviewable video and carries the locators
//! the engine dereferences: the raw monolithic file, the adaptive-streaming
//! manifest (cache-busted per attach) and per-keyframe thumbnail images.
//! Frame rates arrive from external result data and may be missing or
//! malformed, so every entry point sanitizes through [`sanitize_fps`].

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Frame rate assumed when result data omits or mangles `fps`.
pub const DEFAULT_FPS: f64 = 25.0;

/// Clamp an externally supplied frame rate to something usable.
pub fn sanitize_fps(fps: Option<f64>) -> f64 {
    match fps {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => DEFAULT_FPS,
    }
}

/// Timestamp of a keyframe in seconds.
pub fn keyframe_time_secs(keyframe_index: u32, fps: Option<f64>) -> f64 {
    keyframe_index as f64 / sanitize_fps(fps)
}

/// Submit-time arithmetic: keyframe timestamp in rounded milliseconds.
pub fn keyframe_time_ms(keyframe_index: u32, fps: Option<f64>) -> u64 {
    (keyframe_time_secs(keyframe_index, fps) * 1000.0).round() as u64
}

/// Thumbnail locator for one keyframe of one video.
pub fn keyframe_locator(video_id: &str, keyframe_index: u32) -> String {
    format!("/keyframes/{video_id}/keyframe_{keyframe_index}.webp")
}

/// Identifies one reviewable video. Immutable; rebuilt from result data on
/// every render pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaRef {
    video_id: String,
    frame_rate: f64,
    stream_locator: String,
    raw_locator: String,
}

impl MediaRef {
    pub fn new(video_id: &str, fps: Option<f64>) -> Self {
        Self {
            video_id: video_id.to_string(),
            frame_rate: sanitize_fps(fps),
            stream_locator: format!("/hls/{video_id}/playlist.m3u8"),
            raw_locator: format!("/videos/{video_id}"),
        }
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    /// Sanitized frame rate, always > 0.
    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    /// Monolithic media locator.
    pub fn raw_locator(&self) -> &str {
        &self.raw_locator
    }

    /// Raw locator addressed with a start-time fragment.
    pub fn raw_locator_at(&self, start_secs: f64) -> String {
        format!("{}#t={}", self.raw_locator, start_secs.max(0.0))
    }

    /// Adaptive-streaming manifest locator, cache-busted per attach so a
    /// re-ingested video is never served from a stale playlist.
    pub fn manifest_locator(&self) -> String {
        format!("{}?t={}", self.stream_locator, unix_millis())
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
