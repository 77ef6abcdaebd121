//! Frame-accurate time/index arithmetic for a fixed frame rate.
//!
//! **Why**: Playback position is a float in seconds, but review work happens
//! in frame indices. All conversions live here so the modal player, the
//! scrubber label and the submit arithmetic agree on the same mapping.
//!
//! **Used by**: modal player (arrow-key stepping, frame counter), results
//! (submit time), scrubber (time label).
//!
//! # Timing Model
//!
//! `frame = floor(time * fps)`, `time = frame / fps`. A tiny epsilon is added
//! before the floor so that `to_frame(to_time(n))` round-trips for fractional
//! rates like 29.97 where `n / fps * fps` lands just below `n`.

use crate::media::sanitize_fps;

/// Absorbs float error when a time value sits on a frame boundary.
const FRAME_EPSILON: f64 = 1e-6;

/// Pure time <-> frame-index converter for one frame rate.
///
/// Construction sanitizes the rate: non-finite or non-positive values fall
/// back to the default 25 fps, so a stepper is always usable.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameStepper {
    fps: f64,
}

impl FrameStepper {
    pub fn new(fps: f64) -> Self {
        Self { fps: sanitize_fps(Some(fps)) }
    }

    /// Frame rate this stepper was built with (always > 0).
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Frame index containing `time` seconds.
    pub fn to_frame(&self, time: f64) -> i64 {
        if time <= 0.0 {
            return 0;
        }
        (time * self.fps + FRAME_EPSILON).floor() as i64
    }

    /// Start time of frame `frame` in seconds.
    pub fn to_time(&self, frame: i64) -> f64 {
        frame.max(0) as f64 / self.fps
    }

    /// Position after stepping one frame from `time` in `direction`
    /// (+1 forward, -1 backward). Clamped at 0; the caller clamps the upper
    /// bound against the media duration when it is known.
    pub fn step(&self, time: f64, direction: i64) -> f64 {
        let target = self.to_frame(time) + direction;
        self.to_time(target.max(0))
    }

    /// Total displayable frames for a known duration.
    /// Callers must render a placeholder instead when duration is unknown.
    pub fn total_frames(&self, duration: f64) -> i64 {
        if duration <= 0.0 {
            return 0;
        }
        (duration * self.fps + FRAME_EPSILON).floor() as i64
    }
}
