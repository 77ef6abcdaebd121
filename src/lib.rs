//! REVU - Preview/playback lifecycle engine for ranked video-frame review
//!
//! Re-exports all modules for use by binary targets.

// Core engine (events, lifecycle, playback control)
pub mod core;

// App modules
pub mod api;
pub mod cli;
pub mod media;
pub mod paths;
pub mod query;
pub mod results;
pub mod sim;
pub mod store;

// Re-export commonly used types from core
pub use crate::core::bus::{EventBus, Subscription};
pub use crate::core::hover::HoverPreviewController;
pub use crate::core::ledger::ResourceLedger;
pub use crate::core::modal::ModalPlayerController;
pub use crate::core::stepper::FrameStepper;
pub use crate::core::stream::StreamSessionManager;

// Re-export the shared media reference
pub use media::MediaRef;
