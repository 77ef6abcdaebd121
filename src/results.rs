//! Ranked result list: cards, hover previews, modal opening, submit flow.
//!
//! Each search hit becomes a [`ResultCard`] owning its [`MediaRef`], its
//! thumbnail locator and a [`HoverPreviewController`] over a freshly created
//! hidden sink. Replacing or clearing the list detaches every live preview
//! first, so rapid re-searches never leak streaming sessions.

use std::sync::{Arc, Mutex};

use log::{info, warn};
use thiserror::Error;

use crate::api::{ApiClient, ApiError, ResultItem, SearchQuery};
use crate::core::hover::{HoverConfig, HoverPreviewController};
use crate::core::modal::ModalPlayerController;
use crate::core::sink::SinkFactory;
use crate::core::stream::StreamSessionManager;
use crate::media::{self, MediaRef};
use crate::store::SessionStore;

/// Context rewind applied when a card opens in the modal: slightly before
/// the keyframe, a tighter window than the hover preview's.
const MODAL_CONTEXT_SECS: f64 = 0.5;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Please LOGIN first!")]
    NotLoggedIn,
    #[error("no such result")]
    UnknownResult,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// One ranked hit, ready to preview, open and submit.
pub struct ResultCard {
    pub item: ResultItem,
    pub media: MediaRef,
    /// Keyframe thumbnail locator shown on the card.
    pub thumbnail: String,
    hover: HoverPreviewController,
}

impl ResultCard {
    /// Where the modal starts playback for this card.
    pub fn modal_start_time(&self) -> f64 {
        let keyframe_secs = self.item.keyframe_index as f64 / self.media.frame_rate();
        (keyframe_secs - MODAL_CONTEXT_SECS).max(0.0)
    }

    pub fn hover_active(&self) -> bool {
        self.hover.is_active()
    }
}

/// The current result list plus the shared resources its cards draw on.
pub struct ResultsModel {
    cards: Vec<ResultCard>,
    sessions: Arc<Mutex<StreamSessionManager>>,
    sinks: SinkFactory,
    hover_config: HoverConfig,
}

impl ResultsModel {
    pub fn new(
        sessions: Arc<Mutex<StreamSessionManager>>,
        sinks: SinkFactory,
        hover_config: HoverConfig,
    ) -> Self {
        Self {
            cards: Vec::new(),
            sessions,
            sinks,
            hover_config,
        }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[ResultCard] {
        &self.cards
    }

    /// Replace the list with fresh cards, detaching previews of the old one.
    pub fn set_results(&mut self, items: Vec<ResultItem>) {
        self.clear();
        self.cards = items
            .into_iter()
            .map(|item| {
                let media = MediaRef::new(&item.video_id, item.fps);
                let thumbnail = media::keyframe_locator(&item.video_id, item.keyframe_index);
                let hover = HoverPreviewController::new(
                    self.hover_config.clone(),
                    media.clone(),
                    item.keyframe_index,
                    (self.sinks)(),
                    Arc::clone(&self.sessions),
                );
                ResultCard { item, media, thumbnail, hover }
            })
            .collect();
        info!("result list replaced: {} cards", self.cards.len());
    }

    /// Drop every card after detaching any live hover preview.
    pub fn clear(&mut self) {
        for card in &mut self.cards {
            card.hover.pointer_leave();
        }
        self.cards.clear();
    }

    /// Run a search and install its results. A failed search clears the
    /// list: stale results must not outlive the query that produced them.
    pub fn search(&mut self, client: &ApiClient, query: &SearchQuery) -> Result<usize, ApiError> {
        self.apply_search(client.search(query))
    }

    /// Install a search outcome. Split from `search` so the failure path is
    /// testable without a server.
    pub fn apply_search(
        &mut self,
        outcome: Result<Vec<ResultItem>, ApiError>,
    ) -> Result<usize, ApiError> {
        match outcome {
            Ok(items) => {
                self.set_results(items);
                Ok(self.cards.len())
            }
            Err(err) => {
                warn!("search failed: {err}");
                self.clear();
                Err(err)
            }
        }
    }

    /// Submit one card to the evaluation server. Requires stored
    /// credentials; nothing is sent without them.
    pub fn submit(
        &self,
        client: &ApiClient,
        store: &SessionStore,
        index: usize,
    ) -> Result<serde_json::Value, SubmitError> {
        let card = self.cards.get(index).ok_or(SubmitError::UnknownResult)?;
        let session = store.load().ok_or(SubmitError::NotLoggedIn)?;
        let time_ms = media::keyframe_time_ms(card.item.keyframe_index, card.item.fps);
        let response = client.submit(&session, card.media.video_id(), time_ms)?;
        info!("submitted {} at {} ms", card.media.video_id(), time_ms);
        Ok(response)
    }

    /// Open a card in the modal player, rewound slightly before its
    /// keyframe. The card's own hover preview is torn down first.
    pub fn open_in_modal(&mut self, modal: &mut ModalPlayerController, index: usize) {
        let Some(card) = self.cards.get_mut(index) else {
            return;
        };
        card.hover.pointer_leave();
        modal.open(&card.media, card.modal_start_time(), card.media.frame_rate());
    }

    pub fn pointer_enter(&mut self, index: usize) {
        if let Some(card) = self.cards.get_mut(index) {
            card.hover.pointer_enter();
        }
    }

    pub fn pointer_leave(&mut self, index: usize) {
        if let Some(card) = self.cards.get_mut(index) {
            card.hover.pointer_leave();
        }
    }

    /// Pump every card's debounce timer. Called from the host update loop.
    pub fn tick(&mut self) {
        for card in &mut self.cards {
            card.hover.tick();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::PathConfig;
    use crate::sim::{SimSink, SimStreamingClient};
    use std::path::PathBuf;
    use std::time::Duration;

    const DEBOUNCE_MS: u64 = 10;

    fn item(video_id: &str, keyframe: u32, fps: Option<f64>) -> ResultItem {
        ResultItem {
            video_id: video_id.to_string(),
            keyframe_index: keyframe,
            fps,
            clip_score: Some(0.9),
        }
    }

    fn model() -> (ResultsModel, Arc<Mutex<StreamSessionManager>>) {
        let sessions = Arc::new(Mutex::new(StreamSessionManager::new(Box::new(
            SimStreamingClient::supported(),
        ))));
        let sinks: SinkFactory = Box::new(|| Arc::new(Mutex::new(SimSink::new())));
        let config = HoverConfig {
            debounce: Duration::from_millis(DEBOUNCE_MS),
            ..Default::default()
        };
        (ResultsModel::new(sessions.clone(), sinks, config), sessions)
    }

    #[test]
    fn test_set_results_builds_cards() {
        let (mut model, _) = model();
        model.set_results(vec![item("v001", 100, Some(30.0)), item("v002", 5, None)]);
        assert_eq!(model.len(), 2);
        assert_eq!(model.cards()[0].thumbnail, "/keyframes/v001/keyframe_100.webp");
        // Missing fps sanitized to the default
        assert_eq!(model.cards()[1].media.frame_rate(), 25.0);
    }

    #[test]
    fn test_modal_start_time_rewinds_half_second() {
        let (mut model, _) = model();
        model.set_results(vec![item("v001", 100, Some(25.0)), item("v002", 5, Some(25.0))]);
        // 100/25 = 4.0s, minus 0.5s context
        assert!((model.cards()[0].modal_start_time() - 3.5).abs() < 1e-9);
        // 5/25 = 0.2s, clamped at 0
        assert_eq!(model.cards()[1].modal_start_time(), 0.0);
    }

    #[test]
    fn test_failed_search_clears_results() {
        let (mut model, sessions) = model();
        model.set_results(vec![item("v001", 100, Some(25.0))]);
        // Activate the card's hover preview
        model.pointer_enter(0);
        std::thread::sleep(Duration::from_millis(DEBOUNCE_MS + 5));
        model.tick();
        assert_eq!(sessions.lock().unwrap().active_sessions(), 1);

        let err = model
            .apply_search(Err(ApiError::Server("bad request".to_string())))
            .unwrap_err();
        assert_eq!(err.to_string(), "bad request");
        assert!(model.is_empty());
        assert_eq!(sessions.lock().unwrap().active_sessions(), 0);
    }

    #[test]
    fn test_replacing_results_detaches_previews() {
        let (mut model, sessions) = model();
        model.set_results(vec![item("v001", 100, Some(25.0))]);
        model.pointer_enter(0);
        std::thread::sleep(Duration::from_millis(DEBOUNCE_MS + 5));
        model.tick();
        assert_eq!(sessions.lock().unwrap().active_sessions(), 1);

        model.set_results(vec![item("v002", 10, Some(25.0))]);
        assert_eq!(sessions.lock().unwrap().active_sessions(), 0);
        assert_eq!(model.len(), 1);
    }

    #[test]
    fn test_submit_without_login_is_rejected() {
        let (mut model, _) = model();
        model.set_results(vec![item("v001", 100, Some(25.0))]);

        let dir = std::env::temp_dir()
            .join(format!("revu_results_test_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let store = SessionStore::new(&PathConfig { config_dir: Some(PathBuf::from(&dir)) });
        // Unreachable server: the credential check must fire first
        let client = ApiClient::new("http://127.0.0.1:1");

        let err = model.submit(&client, &store, 0).unwrap_err();
        assert_eq!(err.to_string(), "Please LOGIN first!");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_submit_unknown_index_is_rejected() {
        let (model, _) = model();
        let store = SessionStore::new(&PathConfig::default());
        let client = ApiClient::new("http://127.0.0.1:1");
        assert!(matches!(
            model.submit(&client, &store, 3),
            Err(SubmitError::UnknownResult)
        ));
    }
}
