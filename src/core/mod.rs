//! Core engine modules - events, lifecycle, playback control
//!
//! These modules form the preview/playback engine, independent of any host
//! shell: the bus and ledger handle lifecycles, sinks/streams/stages are the
//! trait seams the host implements, and the controllers (hover, modal,
//! scrubber) drive them.

pub mod bus;
pub mod events;
pub mod hover;
pub mod ledger;
pub mod modal;
pub mod scrubber;
pub mod sink;
pub mod stage;
pub mod stepper;
pub mod stream;

// Re-exports for convenience
pub use bus::{EventBus, Subscription};
pub use hover::{HoverConfig, HoverPreviewController};
pub use ledger::ResourceLedger;
pub use modal::{ModalConfig, ModalPlayerController, PlayerCommand};
pub use scrubber::{ScrubberConfig, TimelineScrubber};
pub use sink::{MediaSink, SharedSink, SinkFactory, SinkId, forward_sink_events};
pub use stage::{SharedStage, Stage};
pub use stepper::FrameStepper;
pub use stream::{SessionState, StreamOptions, StreamSessionManager, StreamingClient};
