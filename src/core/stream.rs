//! Adaptive-streaming session lifecycle, one session per sink.
//!
//! **Architecture**: a single [`StreamSessionManager`] owns the table of
//! live [`PlaybackSession`]s keyed by sink. Attaching probes an ordered
//! capability chain - adaptive client, native playlist support on the sink,
//! raw media fallback - and stops at the first that applies. Detaching is
//! unconditional: pause, close the streaming handle, clear the source, drop
//! buffered data.
//!
//! Opening a second session on a sink that already hosts one is a caller
//! bug the manager tolerates by detaching first instead of corrupting the
//! table. Attach failures never propagate; the session degrades to Idle and
//! the caller treats the preview as unavailable.

use std::collections::HashMap;

use log::{debug, info, warn};
use thiserror::Error;
use uuid::Uuid;

use crate::media::MediaRef;

use super::sink::{SharedSink, SinkId};

/// Opaque handle to one open adaptive-streaming (or direct) attachment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionHandle(Uuid);

impl SessionHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Tuning knobs mirroring the streaming client's buffer configuration.
#[derive(Clone, Copy, Debug)]
pub struct StreamOptions {
    /// Position playback here once the manifest is parsed.
    pub start_position: Option<f64>,
    /// Forward buffer target in seconds (small for capture sinks, larger
    /// for hover previews).
    pub max_buffer_secs: f64,
    /// Cap fetched quality to the sink's display size.
    pub cap_to_sink_size: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            start_position: None,
            max_buffer_secs: 5.0,
            cap_to_sink_size: true,
        }
    }
}

/// Why an individual attach strategy failed.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("adaptive streaming not supported by this runtime")]
    Unsupported,
    #[error("failed to open stream: {0}")]
    OpenFailed(String),
}

/// Client-side adaptive-streaming capability (the hls.js analogue).
/// Opaque to the engine; the sim module provides a deterministic one.
pub trait StreamingClient: Send {
    /// Runtime capability probe.
    fn is_supported(&self) -> bool;

    /// Fetch the manifest and start feeding segments into the sink.
    fn open(
        &mut self,
        sink: &SharedSink,
        manifest: &str,
        options: &StreamOptions,
    ) -> Result<SessionHandle, StreamError>;

    /// Stop feeding and release client-side resources for `handle`.
    fn close(&mut self, handle: SessionHandle);
}

/// How the current source ended up on the sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AttachKind {
    /// Segments fed by the adaptive client; handle must be closed on detach.
    Adaptive,
    /// Sink consumes the playlist natively.
    NativePlaylist,
    /// Monolithic raw media locator.
    Raw,
}

/// Session lifecycle state. `handle` is Some exactly while Active.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Attaching,
    Active,
    Detached,
}

/// One sink's attachment record.
#[derive(Clone, Debug)]
pub struct PlaybackSession {
    pub media: MediaRef,
    pub sink_id: SinkId,
    pub handle: Option<SessionHandle>,
    pub state: SessionState,
    kind: AttachKind,
}

impl PlaybackSession {
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }
}

/// Owns every live attachment; enforces single-session-per-sink.
pub struct StreamSessionManager {
    client: Box<dyn StreamingClient>,
    sessions: HashMap<SinkId, PlaybackSession>,
}

impl StreamSessionManager {
    pub fn new(client: Box<dyn StreamingClient>) -> Self {
        Self {
            client,
            sessions: HashMap::new(),
        }
    }

    /// Attach `media` to `sink`. Self-heals a double-attach by detaching the
    /// existing session first. Returns the resulting session snapshot, or
    /// None when every strategy failed (preview unavailable, not an error).
    pub fn attach(
        &mut self,
        sink: &SharedSink,
        media: &MediaRef,
        options: StreamOptions,
    ) -> Option<PlaybackSession> {
        let sink_id = sink.lock().unwrap_or_else(|e| e.into_inner()).id();

        if let Some(existing) = self.sessions.get(&sink_id) {
            if existing.state != SessionState::Idle {
                warn!(
                    "sink {} already hosts a {:?} session, detaching before re-attach",
                    sink_id, existing.state
                );
                self.detach(sink);
            }
        }

        let mut session = PlaybackSession {
            media: media.clone(),
            sink_id,
            handle: None,
            state: SessionState::Attaching,
            kind: AttachKind::Raw,
        };

        if self.client.is_supported() {
            match self.client.open(sink, &media.manifest_locator(), &options) {
                Ok(handle) => {
                    session.handle = Some(handle);
                    session.state = SessionState::Active;
                    session.kind = AttachKind::Adaptive;
                    debug!("adaptive session {:?} attached to sink {}", handle, sink_id);
                }
                Err(err) => {
                    // Network/manifest failure degrades to no preview.
                    warn!("stream attach failed for {}: {}", media.video_id(), err);
                    return None;
                }
            }
        } else {
            let mut guard = sink.lock().unwrap_or_else(|e| e.into_inner());
            if guard.plays_hls_natively() {
                guard.set_source(&media.manifest_locator(), options.start_position);
                session.kind = AttachKind::NativePlaylist;
            } else {
                guard.set_source(media.raw_locator(), options.start_position);
                session.kind = AttachKind::Raw;
            }
            session.handle = Some(SessionHandle::new());
            session.state = SessionState::Active;
            debug!("direct {:?} source set on sink {}", session.kind, sink_id);
        }

        self.sessions.insert(sink_id, session.clone());
        Some(session)
    }

    /// Stop playback on `sink`, close its streaming handle, clear the source
    /// and drop buffered data. Detaching an idle sink is a no-op.
    pub fn detach(&mut self, sink: &SharedSink) {
        let sink_id = sink.lock().unwrap_or_else(|e| e.into_inner()).id();
        let Some(mut session) = self.sessions.remove(&sink_id) else {
            return;
        };

        if let Some(handle) = session.handle.take() {
            if session.kind == AttachKind::Adaptive {
                self.client.close(handle);
            }
        }
        session.state = SessionState::Detached;

        let mut guard = sink.lock().unwrap_or_else(|e| e.into_inner());
        guard.pause();
        guard.clear_source();
        info!("detached session from sink {}", sink_id);
    }

    /// Current state for a sink (Idle when it hosts no session).
    pub fn session_state(&self, sink_id: SinkId) -> SessionState {
        self.sessions
            .get(&sink_id)
            .map(|s| s.state)
            .unwrap_or(SessionState::Idle)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.values().filter(|s| s.is_active()).count()
    }
}

impl std::fmt::Debug for StreamSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSessionManager")
            .field("sessions", &self.sessions.len())
            .finish()
    }
}
