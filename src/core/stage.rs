//! Overlay widget surface for the modal player.
//!
//! The engine builds its timeline bar, progress fill, floating preview and
//! frame controls as abstract widgets on a [`Stage`]; the host shell decides
//! how they are drawn. Insertions return handles whose removal the modal
//! session records in its ledger, which is what guarantees a closed modal
//! leaves no overlay behind.

use std::sync::{Arc, Mutex};

use uuid::Uuid;

/// Handle to one inserted overlay widget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OverlayId(Uuid);

impl OverlayId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OverlayId {
    fn default() -> Self {
        Self::new()
    }
}

/// Widget kinds the modal session inserts on open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayWidget {
    TimelineBar,
    ProgressFill,
    PreviewPopup,
    FrameControls,
    TitleText,
}

/// An encoded still image ready for display in the preview popup.
#[derive(Clone)]
pub struct EncodedImage {
    pub mime: &'static str,
    pub data: Vec<u8>,
}

impl EncodedImage {
    pub fn jpeg(data: Vec<u8>) -> Self {
        Self { mime: "image/jpeg", data }
    }
}

impl std::fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedImage")
            .field("mime", &self.mime)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// State pushes toward a widget.
#[derive(Clone, Debug)]
pub enum WidgetUpdate {
    /// Filled portion of the progress bar, 0..=100.
    ProgressPercent(f32),
    /// Show or hide the floating preview popup.
    PreviewVisible(bool),
    /// Horizontal position of the preview popup along the bar, 0..=100.
    PreviewPosition(f32),
    /// `minutes:seconds` label under the preview thumbnail.
    TimeLabel(String),
    /// Thumbnail image; None hides the image while keeping the label.
    PreviewImage(Option<EncodedImage>),
    /// "Frame: current / total" text in the frame controls.
    FrameInfo(String),
    /// Modal title text.
    Title(String),
}

/// Host-rendered surface the modal builds its overlays on.
pub trait Stage: Send {
    /// Insert a widget, returning the handle used for updates and removal.
    fn insert(&mut self, widget: OverlayWidget) -> OverlayId;

    /// Remove a widget. Unknown handles are ignored.
    fn remove(&mut self, id: OverlayId);

    /// Push new state to a widget.
    fn update(&mut self, id: OverlayId, update: WidgetUpdate);

    /// Left edge and width of the timeline bar in stage coordinates,
    /// for pointer-position-to-percent mapping.
    fn timeline_bounds(&self) -> (f32, f32);
}

pub type SharedStage = Arc<Mutex<dyn Stage>>;
