//! Deterministic in-memory implementations of the engine's trait seams.
//!
//! **Why**: the engine drives sinks, streaming clients and stages through
//! traits; this module supplies implementations with no decoder, network or
//! window behind them. The `--demo` run and the test suites both use them,
//! so asynchronous behavior (seek completion, position progress) is explicit:
//! nothing happens until `tick()` or `complete_pending_seek()` is called.

use std::sync::{Arc, Mutex};

use log::trace;

use crate::core::sink::{CaptureError, MediaSink, PlaybackError, RasterFrame, SinkEvent, SinkId};
use crate::core::stage::{EncodedImage, OverlayId, OverlayWidget, Stage, WidgetUpdate};
use crate::core::stream::{SessionHandle, StreamError, StreamOptions, StreamingClient};

/// Scripted media sink. Seeks stay pending until completed explicitly or by
/// the next `tick()`, mirroring the asynchronous seeks of a real element.
pub struct SimSink {
    id: SinkId,
    source: Option<String>,
    position: f64,
    duration: Option<f64>,
    paused: bool,
    native_hls: bool,
    autoplay_blocked: bool,
    failing_captures: bool,
    pending_seek: Option<f64>,
    last_seek: Option<f64>,
    seeks: usize,
    events: Vec<SinkEvent>,
}

impl SimSink {
    pub fn new() -> Self {
        Self {
            id: SinkId::new(),
            source: None,
            position: 0.0,
            duration: None,
            paused: true,
            native_hls: false,
            autoplay_blocked: false,
            failing_captures: false,
            pending_seek: None,
            last_seek: None,
            seeks: 0,
            events: Vec::new(),
        }
    }

    /// Sink that consumes adaptive playlists natively.
    pub fn with_native_hls(mut self, native: bool) -> Self {
        self.native_hls = native;
        self
    }

    /// Sink whose runtime rejects unmuted autoplay.
    pub fn with_autoplay_blocked(mut self, blocked: bool) -> Self {
        self.autoplay_blocked = blocked;
        self
    }

    pub fn set_duration(&mut self, duration: f64) {
        self.duration = Some(duration);
    }

    pub fn set_position(&mut self, position: f64) {
        self.position = position;
    }

    pub fn fail_captures(&mut self, fail: bool) {
        self.failing_captures = fail;
    }

    pub fn seek_count(&self) -> usize {
        self.seeks
    }

    pub fn last_seek_target(&self) -> Option<f64> {
        self.last_seek
    }

    /// Land the in-flight seek at its target (clamped to the duration) and
    /// queue the completion event.
    pub fn complete_pending_seek(&mut self) {
        let Some(target) = self.pending_seek.take() else {
            return;
        };
        let mut landed = target.max(0.0);
        if let Some(duration) = self.duration {
            landed = landed.min(duration);
        }
        self.position = landed;
        self.events.push(SinkEvent::SeekCompleted { position: landed });
    }

    /// Advance simulated time by `dt` seconds: complete any pending seek,
    /// then progress playback and queue the position notification.
    pub fn tick(&mut self, dt: f64) {
        self.complete_pending_seek();
        if self.paused || self.source.is_none() {
            return;
        }
        self.position += dt;
        if let Some(duration) = self.duration {
            if self.position >= duration {
                self.position = duration;
                self.paused = true;
            }
        }
        self.events.push(SinkEvent::PositionChanged {
            position: self.position,
            duration: self.duration,
        });
    }
}

impl Default for SimSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaSink for SimSink {
    fn id(&self) -> SinkId {
        self.id
    }

    fn set_source(&mut self, locator: &str, start_at: Option<f64>) {
        self.source = Some(locator.to_string());
        self.position = start_at.unwrap_or(0.0).max(0.0);
        self.paused = true;
        self.pending_seek = None;
        if let Some(duration) = self.duration {
            self.events.push(SinkEvent::MetadataLoaded { duration });
        }
        trace!("sim sink {}: source {}", self.id, locator);
    }

    fn clear_source(&mut self) {
        self.source = None;
        self.position = 0.0;
        self.paused = true;
        self.pending_seek = None;
        self.events.clear();
    }

    fn source(&self) -> Option<String> {
        self.source.clone()
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        if self.source.is_none() {
            return Err(PlaybackError::NoSource);
        }
        if self.autoplay_blocked {
            return Err(PlaybackError::AutoplayBlocked);
        }
        self.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn seek(&mut self, time: f64) {
        self.seeks += 1;
        self.last_seek = Some(time);
        self.pending_seek = Some(time);
    }

    fn current_time(&self) -> f64 {
        self.position
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn plays_hls_natively(&self) -> bool {
        self.native_hls
    }

    fn capture_frame(&self) -> Result<RasterFrame, CaptureError> {
        if self.failing_captures || self.source.is_none() {
            return Err(CaptureError::NotDecodable);
        }
        // Flat color derived from the position so captures at different
        // times are distinguishable.
        let shade = (self.position * 10.0) as u64 % 256;
        let (width, height) = (32u32, 18u32);
        Ok(RasterFrame {
            width,
            height,
            pixels: vec![shade as u8; (width * height * 3) as usize],
        })
    }

    fn take_events(&mut self) -> Vec<SinkEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Scripted adaptive-streaming client. Records every opened and closed
/// handle so tests can assert teardown ordering.
pub struct SimStreamingClient {
    supported: bool,
    fail_open: bool,
    closed: Arc<Mutex<Vec<SessionHandle>>>,
}

impl SimStreamingClient {
    pub fn supported() -> Self {
        Self {
            supported: true,
            fail_open: false,
            closed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn unsupported() -> Self {
        Self { supported: false, ..Self::supported() }
    }

    /// Supported, but every open fails (unreachable manifest).
    pub fn failing() -> Self {
        Self { fail_open: true, ..Self::supported() }
    }

    /// Shared view of handles closed so far, in close order.
    pub fn closed_handles(&self) -> Arc<Mutex<Vec<SessionHandle>>> {
        Arc::clone(&self.closed)
    }
}

impl StreamingClient for SimStreamingClient {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn open(
        &mut self,
        sink: &crate::core::sink::SharedSink,
        manifest: &str,
        options: &StreamOptions,
    ) -> Result<SessionHandle, StreamError> {
        if self.fail_open {
            return Err(StreamError::OpenFailed("manifest unreachable".to_string()));
        }
        sink.lock()
            .unwrap_or_else(|e| e.into_inner())
            .set_source(manifest, options.start_position);
        Ok(SessionHandle::new())
    }

    fn close(&mut self, handle: SessionHandle) {
        self.closed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle);
    }
}

/// Recording stage: keeps the last value pushed to each widget kind so tests
/// and the demo loop can inspect what would be on screen.
pub struct SimStage {
    bounds: (f32, f32),
    widgets: Vec<(OverlayId, OverlayWidget)>,
    progress_percent: f32,
    preview_visible: bool,
    preview_position: f32,
    time_label: String,
    preview_image: Option<EncodedImage>,
    frame_info: String,
    title: String,
}

impl SimStage {
    pub fn new() -> Self {
        Self::with_bounds(0.0, 100.0)
    }

    /// Stage whose timeline bar spans `left..left+width`.
    pub fn with_bounds(left: f32, width: f32) -> Self {
        Self {
            bounds: (left, width),
            widgets: Vec::new(),
            progress_percent: 0.0,
            preview_visible: false,
            preview_position: 0.0,
            time_label: String::new(),
            preview_image: None,
            frame_info: String::new(),
            title: String::new(),
        }
    }

    pub fn widget_count(&self) -> usize {
        self.widgets.len()
    }

    pub fn progress_percent(&self) -> f32 {
        self.progress_percent
    }

    pub fn preview_visible(&self) -> bool {
        self.preview_visible
    }

    pub fn preview_position(&self) -> f32 {
        self.preview_position
    }

    pub fn time_label(&self) -> &str {
        &self.time_label
    }

    pub fn preview_image(&self) -> Option<&EncodedImage> {
        self.preview_image.as_ref()
    }

    pub fn frame_info(&self) -> &str {
        &self.frame_info
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

impl Default for SimStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for SimStage {
    fn insert(&mut self, widget: OverlayWidget) -> OverlayId {
        let id = OverlayId::new();
        self.widgets.push((id, widget));
        id
    }

    fn remove(&mut self, id: OverlayId) {
        self.widgets.retain(|(w, _)| *w != id);
    }

    fn update(&mut self, _id: OverlayId, update: WidgetUpdate) {
        match update {
            WidgetUpdate::ProgressPercent(p) => self.progress_percent = p,
            WidgetUpdate::PreviewVisible(v) => self.preview_visible = v,
            WidgetUpdate::PreviewPosition(p) => self.preview_position = p,
            WidgetUpdate::TimeLabel(label) => self.time_label = label,
            WidgetUpdate::PreviewImage(img) => self.preview_image = img,
            WidgetUpdate::FrameInfo(info) => self.frame_info = info,
            WidgetUpdate::Title(title) => self.title = title,
        }
    }

    fn timeline_bounds(&self) -> (f32, f32) {
        self.bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seek_stays_pending_until_completed() {
        let mut sink = SimSink::new();
        sink.set_duration(100.0);
        sink.set_source("/videos/v1", None);
        sink.seek(42.0);
        assert_eq!(sink.current_time(), 0.0);
        sink.complete_pending_seek();
        assert_eq!(sink.current_time(), 42.0);
        assert!(matches!(
            sink.take_events().last(),
            Some(SinkEvent::SeekCompleted { position }) if *position == 42.0
        ));
    }

    #[test]
    fn test_tick_progresses_playback_and_pauses_at_end() {
        let mut sink = SimSink::new();
        sink.set_duration(1.0);
        sink.set_source("/videos/v1", None);
        sink.play().unwrap();
        sink.tick(0.4);
        sink.tick(0.4);
        sink.tick(0.4);
        assert_eq!(sink.current_time(), 1.0);
        assert!(sink.is_paused());
    }

    #[test]
    fn test_play_without_source_fails() {
        let mut sink = SimSink::new();
        assert!(matches!(sink.play(), Err(PlaybackError::NoSource)));
    }

    #[test]
    fn test_capture_requires_source() {
        let mut sink = SimSink::new();
        assert!(sink.capture_frame().is_err());
        sink.set_source("/videos/v1", None);
        let frame = sink.capture_frame().unwrap();
        assert_eq!(frame.pixels.len(), (frame.width * frame.height * 3) as usize);
    }
}
