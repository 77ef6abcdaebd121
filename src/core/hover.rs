//! Per-card hover preview with debounced open.
//!
//! Skimming a result grid crosses dozens of cards per second; attaching a
//! streaming session for each would thrash the network and the decoder.
//! Pointer-enter therefore only arms a debounce timer, and the session is
//! created when the pointer has rested on the card for the debounce window.
//! Pointer-leave at any point cancels the timer or detaches the session,
//! leaving zero residue so a re-enter starts a fresh lifecycle.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::media::MediaRef;

use super::sink::SharedSink;
use super::stream::{PlaybackSession, StreamOptions, StreamSessionManager};

/// Debounce and context tuning. The 200 ms debounce is the observed minimum
/// across variants; context padding starts playback slightly before the
/// keyframe of interest.
#[derive(Clone, Debug)]
pub struct HoverConfig {
    pub debounce: Duration,
    pub context_padding_secs: f64,
    pub max_buffer_secs: f64,
}

impl Default for HoverConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(200),
            context_padding_secs: 1.5,
            max_buffer_secs: 5.0,
        }
    }
}

/// A card is either waiting to open or already open, never both.
#[derive(Debug, Default)]
struct HoverState {
    pending: Option<Instant>,
    session: Option<PlaybackSession>,
}

/// One per result card. Owns the card's hidden preview sink.
pub struct HoverPreviewController {
    config: HoverConfig,
    media: MediaRef,
    keyframe_index: u32,
    sink: SharedSink,
    sessions: Arc<Mutex<StreamSessionManager>>,
    state: HoverState,
}

impl HoverPreviewController {
    pub fn new(
        config: HoverConfig,
        media: MediaRef,
        keyframe_index: u32,
        sink: SharedSink,
        sessions: Arc<Mutex<StreamSessionManager>>,
    ) -> Self {
        Self {
            config,
            media,
            keyframe_index,
            sink,
            sessions,
            state: HoverState::default(),
        }
    }

    /// Preview start time: just before the keyframe, clamped at 0.
    pub fn start_time(&self) -> f64 {
        let keyframe_secs = self.keyframe_index as f64 / self.media.frame_rate();
        (keyframe_secs - self.config.context_padding_secs).max(0.0)
    }

    /// Arm the debounce timer. No resources are created yet.
    pub fn pointer_enter(&mut self) {
        if self.state.session.is_some() {
            return;
        }
        self.state.pending = Some(Instant::now() + self.config.debounce);
        trace!("hover armed for {}", self.media.video_id());
    }

    /// Cancel the pending timer and tear down any active preview.
    pub fn pointer_leave(&mut self) {
        self.state.pending = None;
        if self.state.session.take().is_some() {
            self.sessions
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .detach(&self.sink);
            trace!("hover preview detached for {}", self.media.video_id());
        }
    }

    /// Fire the debounce if its window has elapsed. Called from the host
    /// update loop.
    pub fn tick(&mut self) {
        let Some(deadline) = self.state.pending else {
            return;
        };
        if Instant::now() < deadline {
            return;
        }
        self.state.pending = None;
        self.open_preview();
    }

    fn open_preview(&mut self) {
        let options = StreamOptions {
            start_position: Some(self.start_time()),
            max_buffer_secs: self.config.max_buffer_secs,
            cap_to_sink_size: true,
        };
        let session = self
            .sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .attach(&self.sink, &self.media, options);

        let Some(session) = session else {
            // Attach degraded; the card stays static.
            debug!("hover preview unavailable for {}", self.media.video_id());
            return;
        };

        if let Err(err) = self.sink.lock().unwrap_or_else(|e| e.into_inner()).play() {
            // Autoplay rejection tolerated; session stays attached, paused.
            debug!("hover autoplay rejected for {}: {}", self.media.video_id(), err);
        }
        self.state.session = Some(session);
    }

    pub fn is_active(&self) -> bool {
        self.state.session.is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.state.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimSink, SimStreamingClient};
    use std::sync::{Arc, Mutex};

    const DEBOUNCE_MS: u64 = 10;

    fn rig(keyframe: u32, fps: f64) -> (HoverPreviewController, Arc<Mutex<StreamSessionManager>>) {
        let sessions = Arc::new(Mutex::new(StreamSessionManager::new(Box::new(
            SimStreamingClient::supported(),
        ))));
        let sink: SharedSink = Arc::new(Mutex::new(SimSink::new()));
        let config = HoverConfig {
            debounce: Duration::from_millis(DEBOUNCE_MS),
            ..Default::default()
        };
        let hover = HoverPreviewController::new(
            config,
            MediaRef::new("v007", Some(fps)),
            keyframe,
            sink,
            sessions.clone(),
        );
        (hover, sessions)
    }

    #[test]
    fn test_start_time_scenario() {
        // keyframe 50 at 25 fps, 1.5s padding -> 0.5s
        let (hover, _) = rig(50, 25.0);
        assert!((hover.start_time() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_start_time_clamps_at_zero() {
        let (hover, _) = rig(10, 25.0); // 0.4s - 1.5s < 0
        assert_eq!(hover.start_time(), 0.0);
    }

    #[test]
    fn test_leave_before_debounce_creates_no_session() {
        let (mut hover, sessions) = rig(50, 25.0);
        hover.pointer_enter();
        assert!(hover.is_pending());
        hover.pointer_leave();
        std::thread::sleep(Duration::from_millis(DEBOUNCE_MS + 5));
        hover.tick();
        assert!(!hover.is_active());
        assert_eq!(sessions.lock().unwrap().active_sessions(), 0);
    }

    #[test]
    fn test_debounce_fires_and_attaches() {
        let (mut hover, sessions) = rig(50, 25.0);
        hover.pointer_enter();
        hover.tick();
        // Not yet: window still open
        assert!(!hover.is_active());
        std::thread::sleep(Duration::from_millis(DEBOUNCE_MS + 5));
        hover.tick();
        assert!(hover.is_active());
        assert!(!hover.is_pending());
        assert_eq!(sessions.lock().unwrap().active_sessions(), 1);
    }

    #[test]
    fn test_leave_after_open_detaches_and_reenter_is_fresh() {
        let (mut hover, sessions) = rig(50, 25.0);
        hover.pointer_enter();
        std::thread::sleep(Duration::from_millis(DEBOUNCE_MS + 5));
        hover.tick();
        assert!(hover.is_active());

        hover.pointer_leave();
        assert!(!hover.is_active());
        assert_eq!(sessions.lock().unwrap().active_sessions(), 0);

        // Fresh lifecycle on re-enter
        hover.pointer_enter();
        std::thread::sleep(Duration::from_millis(DEBOUNCE_MS + 5));
        hover.tick();
        assert!(hover.is_active());
        assert_eq!(sessions.lock().unwrap().active_sessions(), 1);
    }

    #[test]
    fn test_autoplay_rejection_keeps_session() {
        let sessions = Arc::new(Mutex::new(StreamSessionManager::new(Box::new(
            SimStreamingClient::supported(),
        ))));
        let sink: SharedSink =
            Arc::new(Mutex::new(SimSink::new().with_autoplay_blocked(true)));
        let mut hover = HoverPreviewController::new(
            HoverConfig { debounce: Duration::from_millis(DEBOUNCE_MS), ..Default::default() },
            MediaRef::new("v007", Some(25.0)),
            50,
            sink.clone(),
            sessions,
        );
        hover.pointer_enter();
        std::thread::sleep(Duration::from_millis(DEBOUNCE_MS + 5));
        hover.tick();
        assert!(hover.is_active());
        assert!(sink.lock().unwrap().is_paused());
    }
}
