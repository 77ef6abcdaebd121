//! Timeline scrubbing: pointer -> time mapping, floating time label and
//! lazily captured thumbnails.
//!
//! Thumbnails come from a hidden secondary sink: the scrubber seeks it to
//! the hovered time and, when the seek completes, draws the sink's frame
//! into a JPEG shown in the preview popup. Two mechanisms keep rapid
//! pointer movement from flooding the pipeline:
//!
//! 1. a throttle window - at most one capture pass is scheduled per
//!    outstanding window, and only the latest requested target is honored;
//! 2. a post-seek tolerance check - a completion whose landing position is
//!    more than `seek_tolerance` from the most recent target is a stale
//!    result of a superseded request and is discarded silently.
//!
//! The primary player's position is never moved by hovering; only a direct
//! click on the bar performs a real seek.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use image::codecs::jpeg::JpegEncoder;
use log::debug;
use lru::LruCache;

use super::sink::{RasterFrame, SharedSink, SinkId};
use super::stage::{EncodedImage, OverlayId, SharedStage, WidgetUpdate};

/// Tuning for hover capture. Defaults follow the observed behavior: a
/// 50-80 ms throttle window and a 0.5 s landing tolerance.
#[derive(Clone, Debug)]
pub struct ScrubberConfig {
    pub throttle: Duration,
    pub seek_tolerance: f64,
    pub jpeg_quality: u8,
    pub thumb_cache_size: usize,
}

impl Default for ScrubberConfig {
    fn default() -> Self {
        Self {
            throttle: Duration::from_millis(60),
            seek_tolerance: 0.5,
            jpeg_quality: 60,
            thumb_cache_size: 32,
        }
    }
}

/// Pointer-driven seek-position computation plus throttled thumbnail
/// capture for one modal session.
pub struct TimelineScrubber {
    config: ScrubberConfig,
    primary: SharedSink,
    capture: SharedSink,
    capture_id: SinkId,
    stage: SharedStage,
    fill: OverlayId,
    preview: OverlayId,
    /// Latest requested hover time; only this target is honored.
    hover_target: Option<f64>,
    /// Target of the capture seek currently in flight.
    requested: Option<f64>,
    /// When the next capture pass may run.
    next_capture_at: Option<Instant>,
    /// Encoded thumbnails keyed by 100 ms time bucket.
    thumbs: LruCache<u64, EncodedImage>,
}

impl TimelineScrubber {
    pub fn new(
        config: ScrubberConfig,
        primary: SharedSink,
        capture: SharedSink,
        stage: SharedStage,
        fill: OverlayId,
        preview: OverlayId,
    ) -> Self {
        let capture_id = capture.lock().unwrap_or_else(|e| e.into_inner()).id();
        let cap = NonZeroUsize::new(config.thumb_cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            primary,
            capture,
            capture_id,
            stage,
            fill,
            preview,
            hover_target: None,
            requested: None,
            next_capture_at: None,
            thumbs: LruCache::new(cap),
        }
    }

    /// Pointer moved over the bar. No-op until the primary sink knows its
    /// duration.
    pub fn pointer_move(&mut self, x: f32) {
        let Some(duration) = self.primary_duration() else {
            return;
        };
        let Some(percent) = self.percent_at(x) else {
            return;
        };
        let target = percent as f64 * duration;

        {
            let mut stage = self.stage.lock().unwrap_or_else(|e| e.into_inner());
            stage.update(self.preview, WidgetUpdate::PreviewVisible(true));
            stage.update(self.preview, WidgetUpdate::PreviewPosition(percent * 100.0));
            stage.update(self.preview, WidgetUpdate::TimeLabel(format_time(target)));
        }

        if let Some(img) = self.thumbs.get(&quantize(target)).cloned() {
            // Already captured this neighborhood; serve without a seek. The
            // served target still counts as the latest request so a capture
            // left in flight is compared against it and discarded.
            self.hover_target = Some(target);
            self.stage
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .update(self.preview, WidgetUpdate::PreviewImage(Some(img)));
            return;
        }

        self.hover_target = Some(target);
        if self.next_capture_at.is_none() {
            self.next_capture_at = Some(Instant::now() + self.config.throttle);
        }
    }

    /// Pointer left the bar: hide the popup and drop all pending targets.
    pub fn pointer_leave(&mut self) {
        self.hover_target = None;
        self.requested = None;
        self.next_capture_at = None;
        self.stage
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .update(self.preview, WidgetUpdate::PreviewVisible(false));
    }

    /// Direct click: real seek of the primary player.
    pub fn click(&mut self, x: f32) {
        let Some(duration) = self.primary_duration() else {
            return;
        };
        let Some(percent) = self.percent_at(x) else {
            return;
        };
        self.primary
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .seek(percent as f64 * duration);
    }

    /// Primary player position notification: update the filled portion.
    pub fn position_changed(&mut self, position: f64, duration: Option<f64>) {
        let Some(duration) = duration.filter(|d| *d > 0.0) else {
            return;
        };
        let percent = ((position / duration) * 100.0).clamp(0.0, 100.0) as f32;
        self.stage
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .update(self.fill, WidgetUpdate::ProgressPercent(percent));
    }

    /// Run a scheduled capture pass once its throttle window has elapsed.
    pub fn tick(&mut self) {
        let Some(at) = self.next_capture_at else {
            return;
        };
        if Instant::now() < at {
            return;
        }
        self.next_capture_at = None;
        let Some(target) = self.hover_target.take() else {
            return;
        };
        if let Some(img) = self.thumbs.get(&quantize(target)).cloned() {
            self.stage
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .update(self.preview, WidgetUpdate::PreviewImage(Some(img)));
            return;
        }
        self.requested = Some(target);
        self.capture
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .seek(target);
    }

    /// Completion of a capture-sink seek. The landing position must still be
    /// within tolerance of the most recent target; otherwise a newer request
    /// has superseded this one and the frame is dropped.
    pub fn seek_completed(&mut self, sink: SinkId, position: f64) {
        if sink != self.capture_id {
            return;
        }
        let Some(requested) = self.requested.take() else {
            return;
        };
        let latest = self.hover_target.unwrap_or(requested);
        if (position - latest).abs() > self.config.seek_tolerance {
            debug!("discarding stale capture at {position:.2}s (target {latest:.2}s)");
            self.reschedule_if_pending();
            return;
        }

        let captured = self
            .capture
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .capture_frame();
        let update = match captured {
            Ok(frame) => match encode_jpeg(&frame, self.config.jpeg_quality) {
                Ok(img) => {
                    self.thumbs.put(quantize(latest), img.clone());
                    WidgetUpdate::PreviewImage(Some(img))
                }
                Err(err) => {
                    debug!("thumbnail encode failed: {err}");
                    WidgetUpdate::PreviewImage(None)
                }
            },
            Err(err) => {
                debug!("thumbnail capture failed: {err}");
                WidgetUpdate::PreviewImage(None)
            }
        };
        self.stage
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .update(self.preview, update);
        self.reschedule_if_pending();
    }

    fn reschedule_if_pending(&mut self) {
        if self.hover_target.is_some() && self.next_capture_at.is_none() {
            self.next_capture_at = Some(Instant::now() + self.config.throttle);
        }
    }

    fn primary_duration(&self) -> Option<f64> {
        self.primary
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .duration()
            .filter(|d| *d > 0.0)
    }

    fn percent_at(&self, x: f32) -> Option<f32> {
        let (left, width) = self
            .stage
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .timeline_bounds();
        if width <= 0.0 {
            return None;
        }
        Some(((x - left) / width).clamp(0.0, 1.0))
    }
}

/// `minutes:seconds` label text.
fn format_time(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// 100 ms buckets for thumbnail reuse.
fn quantize(secs: f64) -> u64 {
    (secs.max(0.0) * 10.0).round() as u64
}

fn encode_jpeg(frame: &RasterFrame, quality: u8) -> image::ImageResult<EncodedImage> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder.encode(
        &frame.pixels,
        frame.width,
        frame.height,
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(EncodedImage::jpeg(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sink::MediaSink;
    use crate::sim::{SimSink, SimStage};
    use std::sync::{Arc, Mutex};

    const THROTTLE_MS: u64 = 5;

    struct Rig {
        scrubber: TimelineScrubber,
        primary: Arc<Mutex<SimSink>>,
        capture: Arc<Mutex<SimSink>>,
        stage: Arc<Mutex<SimStage>>,
        capture_id: SinkId,
    }

    fn rig(duration: Option<f64>) -> Rig {
        let mut primary_sink = SimSink::new();
        let mut capture_sink = SimSink::new();
        if let Some(d) = duration {
            primary_sink.set_duration(d);
            capture_sink.set_duration(d);
        }
        capture_sink.set_source("/hls/v1/playlist.m3u8", None);
        let capture_id = capture_sink.id();

        let primary = Arc::new(Mutex::new(primary_sink));
        let capture = Arc::new(Mutex::new(capture_sink));
        // Bar spans x = 0..400
        let stage = Arc::new(Mutex::new(SimStage::with_bounds(0.0, 400.0)));

        let fill = OverlayId::new();
        let preview = OverlayId::new();
        let config = ScrubberConfig {
            throttle: Duration::from_millis(THROTTLE_MS),
            ..Default::default()
        };
        let scrubber = TimelineScrubber::new(
            config,
            primary.clone(),
            capture.clone(),
            stage.clone(),
            fill,
            preview,
        );
        Rig { scrubber, primary, capture, stage, capture_id }
    }

    fn run_capture_pass(r: &mut Rig) {
        std::thread::sleep(Duration::from_millis(THROTTLE_MS + 3));
        r.scrubber.tick();
    }

    #[test]
    fn test_pointer_move_without_duration_is_noop() {
        let mut r = rig(None);
        r.scrubber.pointer_move(200.0);
        assert!(!r.stage.lock().unwrap().preview_visible());
        assert_eq!(r.capture.lock().unwrap().seek_count(), 0);
    }

    #[test]
    fn test_pointer_move_updates_label_and_position() {
        let mut r = rig(Some(100.0));
        // Halfway along the 400px bar at 100s duration -> 50s
        r.scrubber.pointer_move(200.0);
        let stage = r.stage.lock().unwrap();
        assert!(stage.preview_visible());
        assert_eq!(stage.time_label(), "0:50");
        assert!((stage.preview_position() - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_throttle_coalesces_moves_into_one_seek() {
        let mut r = rig(Some(100.0));
        r.scrubber.pointer_move(100.0);
        r.scrubber.pointer_move(150.0);
        r.scrubber.pointer_move(200.0);
        run_capture_pass(&mut r);
        // Only the latest target was seeked
        let capture = r.capture.lock().unwrap();
        assert_eq!(capture.seek_count(), 1);
        assert!((capture.last_seek_target().unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_capture_success_sets_preview_image() {
        let mut r = rig(Some(100.0));
        r.scrubber.pointer_move(200.0);
        run_capture_pass(&mut r);
        r.capture.lock().unwrap().complete_pending_seek();
        let id = r.capture_id;
        r.scrubber.seek_completed(id, 50.0);
        assert!(r.stage.lock().unwrap().preview_image().is_some());
    }

    #[test]
    fn test_stale_completion_is_discarded() {
        let mut r = rig(Some(100.0));
        r.scrubber.pointer_move(200.0); // target 50s
        run_capture_pass(&mut r);
        // A newer target supersedes the in-flight capture
        r.scrubber.pointer_move(40.0); // target 10s
        let id = r.capture_id;
        r.scrubber.seek_completed(id, 50.0);
        assert!(r.stage.lock().unwrap().preview_image().is_none());
    }

    #[test]
    fn test_cache_hit_does_not_unlock_stale_completion() {
        let mut r = rig(Some(100.0));
        let id = r.capture_id;

        // Prime the cache at 10s
        r.scrubber.pointer_move(40.0);
        run_capture_pass(&mut r);
        r.capture.lock().unwrap().complete_pending_seek();
        r.scrubber.seek_completed(id, 10.0);
        let served = r.stage.lock().unwrap().preview_image().unwrap().data.clone();

        // Put a 50s capture in flight, then return to 10s; the cache serves
        // the popup without a new seek
        r.scrubber.pointer_move(200.0);
        run_capture_pass(&mut r);
        r.scrubber.pointer_move(40.0);
        assert_eq!(r.stage.lock().unwrap().preview_image().unwrap().data, served);

        // The in-flight 50s completion is stale and must not overwrite the
        // newer cache-served frame
        r.capture.lock().unwrap().complete_pending_seek();
        r.scrubber.seek_completed(id, 50.0);
        assert_eq!(r.stage.lock().unwrap().preview_image().unwrap().data, served);

        // The rescheduled pass serves 10s from the cache again, no third seek
        run_capture_pass(&mut r);
        assert_eq!(r.capture.lock().unwrap().seek_count(), 2);
        assert_eq!(r.stage.lock().unwrap().preview_image().unwrap().data, served);
    }

    #[test]
    fn test_capture_failure_hides_image_silently() {
        let mut r = rig(Some(100.0));
        r.capture.lock().unwrap().fail_captures(true);
        r.scrubber.pointer_move(200.0);
        run_capture_pass(&mut r);
        let id = r.capture_id;
        r.scrubber.seek_completed(id, 50.0);
        assert!(r.stage.lock().unwrap().preview_image().is_none());
        assert!(r.stage.lock().unwrap().preview_visible());
    }

    #[test]
    fn test_pointer_leave_hides_and_clears_pending() {
        let mut r = rig(Some(100.0));
        r.scrubber.pointer_move(200.0);
        r.scrubber.pointer_leave();
        assert!(!r.stage.lock().unwrap().preview_visible());
        // Pending target was cleared; the window firing does nothing
        run_capture_pass(&mut r);
        assert_eq!(r.capture.lock().unwrap().seek_count(), 0);
    }

    #[test]
    fn test_click_seeks_primary() {
        let mut r = rig(Some(100.0));
        r.scrubber.click(100.0); // 25%
        let primary = r.primary.lock().unwrap();
        assert_eq!(primary.seek_count(), 1);
        assert!((primary.last_seek_target().unwrap() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_position_changed_updates_fill() {
        let mut r = rig(Some(100.0));
        r.scrubber.position_changed(25.0, Some(100.0));
        assert!((r.stage.lock().unwrap().progress_percent() - 25.0).abs() < 0.01);
        // Unknown duration leaves the fill alone
        r.scrubber.position_changed(50.0, None);
        assert!((r.stage.lock().unwrap().progress_percent() - 25.0).abs() < 0.01);
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(75.3), "1:15");
        assert_eq!(format_time(600.0), "10:00");
    }
}
