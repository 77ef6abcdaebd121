//! Event types flowing through the [`EventBus`](super::bus::EventBus).
//!
//! Input events come from the host shell (pointer position over the timeline
//! bar, key presses while the modal is up). Sink events are drained from
//! media sinks by the host loop and re-emitted here, so completions of
//! asynchronous operations (seeks, metadata loads) interleave with user
//! input on the same thread.

use super::sink::SinkId;

/// Keys the modal player reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    Space,
    Escape,
}

/// A key press routed to whoever is currently listening (the modal session
/// subscribes on open and unsubscribes on close).
#[derive(Clone, Copy, Debug)]
pub struct KeyDown {
    pub key: Key,
}

/// Pointer moved over the timeline bar; `x` is in stage coordinates.
#[derive(Clone, Copy, Debug)]
pub struct TimelinePointerMoved {
    pub x: f32,
}

/// Pointer left the timeline bar.
#[derive(Clone, Copy, Debug)]
pub struct TimelinePointerLeft;

/// Click on the timeline bar; seeks the primary player.
#[derive(Clone, Copy, Debug)]
pub struct TimelineClicked {
    pub x: f32,
}

/// Periodic playback-position notification from a sink.
#[derive(Clone, Copy, Debug)]
pub struct PositionChanged {
    pub sink: SinkId,
    pub position: f64,
    pub duration: Option<f64>,
}

/// A previously requested seek finished; `position` is where the sink
/// actually landed.
#[derive(Clone, Copy, Debug)]
pub struct SeekCompleted {
    pub sink: SinkId,
    pub position: f64,
}

/// Media metadata became available (duration is now known).
#[derive(Clone, Copy, Debug)]
pub struct MetadataLoaded {
    pub sink: SinkId,
    pub duration: f64,
}
