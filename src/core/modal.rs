//! Singleton modal player for frame-accurate review.
//!
//! **Architecture**: the controller is long-lived; a [`ModalSession`] exists
//! only while the modal is open and its existence *is* the open/closed
//! state - no flags or sentinel attributes. `open()` builds everything into
//! a fresh [`ResourceLedger`] (overlay widgets, bus subscriptions, the
//! hidden capture sink's streaming session) and `close()` is one
//! unconditional `release()` pass plus a primary-sink reset, so redundant
//! close calls are harmless.
//!
//! Key presses are routed through a command channel drained by `pump()`
//! rather than mutating the controller from inside bus callbacks; the
//! subscription that feeds the channel exists only while a session does.
//!
//! A generation counter tags every subscription: an async completion that
//! arrives for a previous generation is ignored even if it slips in between
//! teardown and dispatch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, info, warn};

use crate::media::MediaRef;

use super::bus::EventBus;
use super::events::{
    Key, KeyDown, MetadataLoaded, PositionChanged, SeekCompleted, TimelineClicked,
    TimelinePointerLeft, TimelinePointerMoved,
};
use super::ledger::ResourceLedger;
use super::scrubber::{ScrubberConfig, TimelineScrubber};
use super::sink::{SharedSink, SinkFactory, SinkId};
use super::stage::{OverlayWidget, SharedStage, WidgetUpdate};
use super::stepper::FrameStepper;
use super::stream::{StreamOptions, StreamSessionManager};

/// Actions produced by key handling, applied by `pump()` on the host loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerCommand {
    StepFrame(i64),
    TogglePlay,
    Close,
}

#[derive(Clone, Debug)]
pub struct ModalConfig {
    /// Forward buffer for the hidden capture sink (kept tiny; it only ever
    /// shows single sought frames).
    pub capture_buffer_secs: f64,
    pub scrubber: ScrubberConfig,
}

impl Default for ModalConfig {
    fn default() -> Self {
        Self {
            capture_buffer_secs: 2.0,
            scrubber: ScrubberConfig::default(),
        }
    }
}

/// Everything owned by one open modal lifecycle.
pub struct ModalSession {
    pub media: MediaRef,
    pub generation: u64,
    ledger: ResourceLedger,
    scrubber: Arc<Mutex<TimelineScrubber>>,
    stepper: FrameStepper,
    /// Kept so the capture sink outlives its ledger teardown entry.
    #[allow(dead_code)]
    capture_sink: SharedSink,
}

impl ModalSession {
    pub fn frame_rate(&self) -> f64 {
        self.stepper.fps()
    }

    pub fn ledger_len(&self) -> usize {
        self.ledger.len()
    }
}

/// Singleton controller for the focused playback surface.
pub struct ModalPlayerController {
    config: ModalConfig,
    bus: EventBus,
    stage: SharedStage,
    primary: SharedSink,
    primary_id: SinkId,
    sessions: Arc<Mutex<StreamSessionManager>>,
    capture_sinks: SinkFactory,
    /// Monotonic; incremented on every open. Compared by subscriptions to
    /// drop completions from superseded sessions.
    generation: Arc<AtomicU64>,
    session: Option<ModalSession>,
    commands_tx: Sender<PlayerCommand>,
    commands_rx: Receiver<PlayerCommand>,
}

impl ModalPlayerController {
    pub fn new(
        config: ModalConfig,
        bus: EventBus,
        stage: SharedStage,
        primary: SharedSink,
        sessions: Arc<Mutex<StreamSessionManager>>,
        capture_sinks: SinkFactory,
    ) -> Self {
        let primary_id = primary.lock().unwrap_or_else(|e| e.into_inner()).id();
        let (commands_tx, commands_rx) = unbounded();
        Self {
            config,
            bus,
            stage,
            primary,
            primary_id,
            sessions,
            capture_sinks,
            generation: Arc::new(AtomicU64::new(0)),
            session: None,
            commands_tx,
            commands_rx,
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&ModalSession> {
        self.session.as_ref()
    }

    /// Open the modal on `media` at `start_time`. A prior session is fully
    /// closed first; two modal sessions never coexist.
    pub fn open(&mut self, media: &MediaRef, start_time: f64, frame_rate: f64) {
        self.close();

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut ledger = ResourceLedger::new();
        let stepper = FrameStepper::new(frame_rate);

        // Primary sink: raw media addressed with a start-time fragment, and
        // the same start handed to the sink for backends that position
        // explicitly instead of parsing the fragment.
        {
            let start = start_time.max(0.0);
            let mut primary = self.primary.lock().unwrap_or_else(|e| e.into_inner());
            primary.set_source(&media.raw_locator_at(start), Some(start));
            if let Err(err) = primary.play() {
                debug!("modal autoplay rejected: {err}");
            }
        }

        // Overlay widgets; each insertion's removal goes into the ledger.
        let (fill, preview, controls) = {
            let mut stage = self.stage.lock().unwrap_or_else(|e| e.into_inner());
            let title = stage.insert(OverlayWidget::TitleText);
            stage.update(
                title,
                WidgetUpdate::Title(format!(
                    "Playing: {} (FPS: {})",
                    media.video_id(),
                    stepper.fps()
                )),
            );
            let bar = stage.insert(OverlayWidget::TimelineBar);
            let fill = stage.insert(OverlayWidget::ProgressFill);
            let preview = stage.insert(OverlayWidget::PreviewPopup);
            let controls = stage.insert(OverlayWidget::FrameControls);
            stage.update(controls, WidgetUpdate::FrameInfo("Frame: 0 / ...".to_string()));
            for id in [title, bar, fill, preview, controls] {
                let stage = Arc::clone(&self.stage);
                ledger.record(move || {
                    stage.lock().unwrap_or_else(|e| e.into_inner()).remove(id);
                });
            }
            (fill, preview, controls)
        };

        // Hidden capture sink with its own small-buffer streaming session.
        // Best effort: failure means no thumbnails, not a failed open.
        let capture_sink = (self.capture_sinks)();
        let capture_options = StreamOptions {
            start_position: None,
            max_buffer_secs: self.config.capture_buffer_secs,
            cap_to_sink_size: true,
        };
        let attached = self
            .sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .attach(&capture_sink, media, capture_options);
        if attached.is_none() {
            warn!("thumbnail capture unavailable for {}", media.video_id());
        }
        {
            let sessions = Arc::clone(&self.sessions);
            let sink = Arc::clone(&capture_sink);
            ledger.record(move || {
                sessions.lock().unwrap_or_else(|e| e.into_inner()).detach(&sink);
            });
        }

        let scrubber = Arc::new(Mutex::new(TimelineScrubber::new(
            self.config.scrubber.clone(),
            Arc::clone(&self.primary),
            Arc::clone(&capture_sink),
            Arc::clone(&self.stage),
            fill,
            preview,
        )));

        // Listener wiring. Every subscription's removal is recorded, and
        // every handler checks the generation tag before acting.
        let live = {
            let current = Arc::clone(&self.generation);
            move || current.load(Ordering::SeqCst) == generation
        };

        {
            let scrubber = Arc::clone(&scrubber);
            let live = live.clone();
            self.record_subscription(
                &mut ledger,
                self.bus.subscribe::<TimelinePointerMoved, _>(move |e| {
                    if live() {
                        scrubber.lock().unwrap_or_else(|g| g.into_inner()).pointer_move(e.x);
                    }
                }),
            );
        }
        {
            let scrubber = Arc::clone(&scrubber);
            let live = live.clone();
            self.record_subscription(
                &mut ledger,
                self.bus.subscribe::<TimelinePointerLeft, _>(move |_| {
                    if live() {
                        scrubber.lock().unwrap_or_else(|g| g.into_inner()).pointer_leave();
                    }
                }),
            );
        }
        {
            let scrubber = Arc::clone(&scrubber);
            let live = live.clone();
            self.record_subscription(
                &mut ledger,
                self.bus.subscribe::<TimelineClicked, _>(move |e| {
                    if live() {
                        scrubber.lock().unwrap_or_else(|g| g.into_inner()).click(e.x);
                    }
                }),
            );
        }
        {
            // Progress fill + frame counter follow the primary's position.
            let scrubber = Arc::clone(&scrubber);
            let stage = Arc::clone(&self.stage);
            let live = live.clone();
            let primary_id = self.primary_id;
            self.record_subscription(
                &mut ledger,
                self.bus.subscribe::<PositionChanged, _>(move |e| {
                    if e.sink != primary_id || !live() {
                        return;
                    }
                    scrubber
                        .lock()
                        .unwrap_or_else(|g| g.into_inner())
                        .position_changed(e.position, e.duration);
                    stage.lock().unwrap_or_else(|g| g.into_inner()).update(
                        controls,
                        WidgetUpdate::FrameInfo(frame_info_text(stepper, e.position, e.duration)),
                    );
                }),
            );
        }
        {
            let stage = Arc::clone(&self.stage);
            let live = live.clone();
            let primary_id = self.primary_id;
            self.record_subscription(
                &mut ledger,
                self.bus.subscribe::<MetadataLoaded, _>(move |e| {
                    if e.sink != primary_id || !live() {
                        return;
                    }
                    stage.lock().unwrap_or_else(|g| g.into_inner()).update(
                        controls,
                        WidgetUpdate::FrameInfo(frame_info_text(stepper, 0.0, Some(e.duration))),
                    );
                }),
            );
        }
        {
            let scrubber = Arc::clone(&scrubber);
            let live = live.clone();
            self.record_subscription(
                &mut ledger,
                self.bus.subscribe::<SeekCompleted, _>(move |e| {
                    if live() {
                        scrubber
                            .lock()
                            .unwrap_or_else(|g| g.into_inner())
                            .seek_completed(e.sink, e.position);
                    }
                }),
            );
        }
        {
            let tx = self.commands_tx.clone();
            self.record_subscription(
                &mut ledger,
                self.bus.subscribe::<KeyDown, _>(move |e| {
                    let command = match e.key {
                        Key::ArrowLeft => PlayerCommand::StepFrame(-1),
                        Key::ArrowRight => PlayerCommand::StepFrame(1),
                        Key::Space => PlayerCommand::TogglePlay,
                        Key::Escape => PlayerCommand::Close,
                    };
                    let _ = tx.send(command);
                }),
            );
        }

        info!(
            "modal opened: {} at {:.2}s (generation {})",
            media.video_id(),
            start_time,
            generation
        );
        self.session = Some(ModalSession {
            media: media.clone(),
            generation,
            ledger,
            scrubber,
            stepper,
            capture_sink,
        });
    }

    /// Close the modal. Idempotent: releasing the ledger tears down every
    /// listener, overlay and the capture sink's streaming session exactly
    /// once.
    pub fn close(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.ledger.release();

        let mut primary = self.primary.lock().unwrap_or_else(|e| e.into_inner());
        primary.pause();
        primary.clear_source();
        drop(primary);

        // Commands queued for the torn-down session are void.
        while self.commands_rx.try_recv().is_ok() {}

        info!("modal closed (generation {})", session.generation);
    }

    /// Drain pending key commands and run the scrubber's capture scheduler.
    /// Called from the host update loop.
    pub fn tick(&mut self) {
        self.pump();
        if let Some(session) = &self.session {
            session
                .scrubber
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .tick();
        }
    }

    /// Apply queued commands. Separate from `tick()` so tests can drive it
    /// without waiting on the capture throttle.
    pub fn pump(&mut self) {
        while let Ok(command) = self.commands_rx.try_recv() {
            if self.session.is_none() {
                continue;
            }
            match command {
                PlayerCommand::StepFrame(direction) => self.step_frame(direction),
                PlayerCommand::TogglePlay => self.toggle_play(),
                PlayerCommand::Close => self.close(),
            }
        }
    }

    /// Step one frame in `direction`. Stepping is a discrete edit operation:
    /// playback always pauses first. Clamped to [0, duration].
    pub fn step_frame(&mut self, direction: i64) {
        let Some(session) = &self.session else {
            return;
        };
        let stepper = session.stepper;
        let mut primary = self.primary.lock().unwrap_or_else(|e| e.into_inner());
        primary.pause();
        let mut target = stepper.step(primary.current_time(), direction);
        if let Some(duration) = primary.duration() {
            target = target.min(duration);
        }
        primary.seek(target);
    }

    pub fn toggle_play(&mut self) {
        if self.session.is_none() {
            return;
        }
        let mut primary = self.primary.lock().unwrap_or_else(|e| e.into_inner());
        if primary.is_paused() {
            if let Err(err) = primary.play() {
                debug!("play rejected: {err}");
            }
        } else {
            primary.pause();
        }
    }

    fn record_subscription(&self, ledger: &mut ResourceLedger, sub: super::bus::Subscription) {
        let bus = self.bus.clone();
        ledger.record(move || bus.unsubscribe(sub));
    }
}

fn frame_info_text(stepper: FrameStepper, position: f64, duration: Option<f64>) -> String {
    let current = stepper.to_frame(position);
    match duration.filter(|d| *d > 0.0) {
        Some(d) => format!("Frame: {} / {}", current, stepper.total_frames(d)),
        None => format!("Frame: {current} / ..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sink::MediaSink;
    use crate::sim::{SimSink, SimStage, SimStreamingClient};

    struct Rig {
        modal: ModalPlayerController,
        bus: EventBus,
        stage: Arc<Mutex<SimStage>>,
        primary: Arc<Mutex<SimSink>>,
        primary_id: SinkId,
        sessions: Arc<Mutex<StreamSessionManager>>,
    }

    fn rig() -> Rig {
        let bus = EventBus::new();
        let stage = Arc::new(Mutex::new(SimStage::with_bounds(0.0, 400.0)));
        let mut primary_sink = SimSink::new();
        primary_sink.set_duration(100.0);
        let primary_id = primary_sink.id();
        let primary = Arc::new(Mutex::new(primary_sink));
        let sessions = Arc::new(Mutex::new(StreamSessionManager::new(Box::new(
            SimStreamingClient::supported(),
        ))));
        let factory: SinkFactory = Box::new(|| {
            let mut sink = SimSink::new();
            sink.set_duration(100.0);
            Arc::new(Mutex::new(sink))
        });
        let modal = ModalPlayerController::new(
            ModalConfig::default(),
            bus.clone(),
            stage.clone(),
            primary.clone(),
            sessions.clone(),
            factory,
        );
        Rig { modal, bus, stage, primary, primary_id, sessions }
    }

    fn media() -> MediaRef {
        MediaRef::new("v001", Some(25.0))
    }

    #[test]
    fn test_open_builds_full_session() {
        let mut r = rig();
        r.modal.open(&media(), 2.0, 25.0);

        assert!(r.modal.is_open());
        assert_eq!(r.modal.session().unwrap().generation, 1);
        assert_eq!(r.stage.lock().unwrap().widget_count(), 5);
        assert_eq!(r.stage.lock().unwrap().title(), "Playing: v001 (FPS: 25)");
        assert_eq!(r.bus.subscriber_count::<KeyDown>(), 1);
        // Capture sink got its streaming session
        assert_eq!(r.sessions.lock().unwrap().active_sessions(), 1);
        let primary = r.primary.lock().unwrap();
        assert!(!primary.is_paused());
        // Raw locator carries the keyframe context as a start fragment
        assert_eq!(primary.source().unwrap(), "/videos/v001#t=2");
    }

    #[test]
    fn test_double_open_keeps_single_session_and_listener() {
        let mut r = rig();
        r.modal.open(&media(), 2.0, 25.0);
        r.modal.open(&MediaRef::new("v002", Some(30.0)), 0.0, 30.0);

        assert!(r.modal.is_open());
        assert_eq!(r.modal.session().unwrap().generation, 2);
        assert_eq!(r.modal.session().unwrap().media.video_id(), "v002");
        // Exactly one of everything, never two
        assert_eq!(r.bus.subscriber_count::<KeyDown>(), 1);
        assert_eq!(r.stage.lock().unwrap().widget_count(), 5);
        assert_eq!(r.sessions.lock().unwrap().active_sessions(), 1);
    }

    #[test]
    fn test_close_releases_everything_and_is_idempotent() {
        let mut r = rig();
        r.modal.open(&media(), 2.0, 25.0);
        assert!(r.modal.session().unwrap().ledger_len() > 0);
        r.modal.close();

        assert!(!r.modal.is_open());
        assert_eq!(r.stage.lock().unwrap().widget_count(), 0);
        assert_eq!(r.bus.subscriber_count::<KeyDown>(), 0);
        assert_eq!(r.bus.subscriber_count::<PositionChanged>(), 0);
        assert_eq!(r.sessions.lock().unwrap().active_sessions(), 0);
        let primary_paused = r.primary.lock().unwrap().is_paused();
        assert!(primary_paused);
        assert!(r.primary.lock().unwrap().source().is_none());

        // Redundant close (overlay click + Escape both firing) is safe
        r.modal.close();
        assert!(!r.modal.is_open());
    }

    #[test]
    fn test_escape_closes_via_command_channel() {
        let mut r = rig();
        r.modal.open(&media(), 2.0, 25.0);
        r.bus.emit(&KeyDown { key: Key::Escape });
        assert!(r.modal.is_open()); // not until pumped
        r.modal.pump();
        assert!(!r.modal.is_open());
        assert_eq!(r.stage.lock().unwrap().widget_count(), 0);
    }

    #[test]
    fn test_arrow_key_steps_one_frame_paused() {
        let mut r = rig();
        r.modal.open(&media(), 0.0, 25.0);
        r.primary.lock().unwrap().set_position(1.0);

        r.bus.emit(&KeyDown { key: Key::ArrowRight });
        r.modal.pump();

        let primary = r.primary.lock().unwrap();
        assert!(primary.is_paused());
        let target = primary.last_seek_target().unwrap();
        assert!((target - 1.04).abs() < 1e-9, "got {target}");
    }

    #[test]
    fn test_step_clamps_to_duration() {
        let mut r = rig();
        r.modal.open(&media(), 0.0, 25.0);
        r.primary.lock().unwrap().set_position(99.999);

        r.modal.step_frame(1);
        let target = r.primary.lock().unwrap().last_seek_target().unwrap();
        assert!(target <= 100.0, "got {target}");

        // And backward from zero stays at zero
        r.primary.lock().unwrap().set_position(0.0);
        r.modal.step_frame(-1);
        let target = r.primary.lock().unwrap().last_seek_target().unwrap();
        assert_eq!(target, 0.0);
    }

    #[test]
    fn test_space_toggles_play_pause() {
        let mut r = rig();
        r.modal.open(&media(), 0.0, 25.0);
        assert!(!r.primary.lock().unwrap().is_paused());

        r.bus.emit(&KeyDown { key: Key::Space });
        r.modal.pump();
        assert!(r.primary.lock().unwrap().is_paused());

        r.bus.emit(&KeyDown { key: Key::Space });
        r.modal.pump();
        assert!(!r.primary.lock().unwrap().is_paused());
    }

    #[test]
    fn test_position_updates_progress_and_frame_info() {
        let mut r = rig();
        r.modal.open(&media(), 0.0, 25.0);
        r.bus.emit(&PositionChanged {
            sink: r.primary_id,
            position: 25.0,
            duration: Some(100.0),
        });
        let stage = r.stage.lock().unwrap();
        assert!((stage.progress_percent() - 25.0).abs() < 0.01);
        assert_eq!(stage.frame_info(), "Frame: 625 / 2500");
    }

    #[test]
    fn test_keys_ignored_while_closed() {
        let mut r = rig();
        r.bus.emit(&KeyDown { key: Key::ArrowRight });
        r.modal.pump();
        assert_eq!(r.primary.lock().unwrap().seek_count(), 0);

        // And after close, the listener itself is gone
        r.modal.open(&media(), 0.0, 25.0);
        r.modal.close();
        r.primary.lock().unwrap().set_position(1.0);
        r.bus.emit(&KeyDown { key: Key::ArrowRight });
        r.modal.pump();
        assert_eq!(r.primary.lock().unwrap().seek_count(), 0);
    }

    #[test]
    fn test_invalid_fps_defaults_in_title() {
        let mut r = rig();
        r.modal.open(&MediaRef::new("v003", None), 0.0, f64::NAN);
        assert_eq!(r.stage.lock().unwrap().title(), "Playing: v003 (FPS: 25)");
    }
}
