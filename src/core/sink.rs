//! Media sink abstraction - the browser-like playable surface.
//!
//! A sink is an opaque renderable/audible media element: the visible modal
//! player, a hidden per-card preview element, or the hidden thumbnail
//! capture element. The engine never touches a real decoder; it drives
//! sinks through this trait and the host supplies the implementation
//! (the `sim` module provides a deterministic one).
//!
//! Asynchronous completions (seek done, metadata loaded) are queued inside
//! the sink and drained by the host loop via `take_events()`, then forwarded
//! onto the bus. Draining outside the sink lock keeps callback dispatch free
//! of lock cycles.

use std::sync::{Arc, Mutex};

use thiserror::Error;
use uuid::Uuid;

use super::bus::EventBus;
use super::events::{MetadataLoaded, PositionChanged, SeekCompleted};

/// Identifies one sink across events and sessions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SinkId(Uuid);

impl SinkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SinkId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Playback-control failure. Autoplay rejection is the only variant callers
/// routinely swallow; the UI just stays paused.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("autoplay blocked by the runtime")]
    AutoplayBlocked,
    #[error("no source attached")]
    NoSource,
}

/// Thumbnail capture failure. Degrades to a hidden preview image.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("frame not decodable yet")]
    NotDecodable,
    #[error("sink has zero dimensions")]
    ZeroSize,
}

/// One decoded video frame, tightly packed RGB8.
#[derive(Clone, Debug)]
pub struct RasterFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Completion events queued inside a sink between host-loop drains.
#[derive(Clone, Copy, Debug)]
pub enum SinkEvent {
    SeekCompleted { position: f64 },
    PositionChanged { position: f64, duration: Option<f64> },
    MetadataLoaded { duration: f64 },
}

/// Browser-like media element. Exactly one playback session may own a sink
/// at a time; [`StreamSessionManager`](super::stream::StreamSessionManager)
/// enforces that.
pub trait MediaSink: Send {
    fn id(&self) -> SinkId;

    /// Assign a media locator, optionally positioned at `start_at` seconds.
    fn set_source(&mut self, locator: &str, start_at: Option<f64>);

    /// Remove the source and drop all buffered data.
    fn clear_source(&mut self);

    /// Currently assigned locator, if any.
    fn source(&self) -> Option<String>;

    fn play(&mut self) -> Result<(), PlaybackError>;
    fn pause(&mut self);
    fn is_paused(&self) -> bool;

    /// Request an asynchronous seek; completion arrives as
    /// [`SinkEvent::SeekCompleted`].
    fn seek(&mut self, time: f64);

    fn current_time(&self) -> f64;

    /// None until metadata has loaded.
    fn duration(&self) -> Option<f64>;

    /// Whether the sink natively understands adaptive-streaming playlists
    /// (the `canPlayType` capability probe).
    fn plays_hls_natively(&self) -> bool;

    /// Grab the currently displayed frame for thumbnail capture.
    fn capture_frame(&self) -> Result<RasterFrame, CaptureError>;

    /// Drain queued completion events.
    fn take_events(&mut self) -> Vec<SinkEvent>;
}

pub type SharedSink = Arc<Mutex<dyn MediaSink>>;

/// Creates hidden sinks on demand (per result card, per modal session).
pub type SinkFactory = Box<dyn Fn() -> SharedSink + Send>;

/// Drain one sink's queued events and re-emit them on the bus with the
/// sink's identity attached. The sink lock is released before dispatch.
pub fn forward_sink_events(bus: &EventBus, sink: &SharedSink) {
    let (id, events) = {
        let mut guard = sink.lock().unwrap_or_else(|e| e.into_inner());
        (guard.id(), guard.take_events())
    };
    for event in events {
        match event {
            SinkEvent::SeekCompleted { position } => {
                bus.emit(&SeekCompleted { sink: id, position });
            }
            SinkEvent::PositionChanged { position, duration } => {
                bus.emit(&PositionChanged { sink: id, position, duration });
            }
            SinkEvent::MetadataLoaded { duration } => {
                bus.emit(&MetadataLoaded { sink: id, duration });
            }
        }
    }
}
