//! Blocking HTTP client for the retrieval/evaluation server.
//!
//! Three endpoints: `POST /search` (ranked keyframe results), `POST
//! /api/login` (evaluation credentials) and `POST /api/submit` (one judged
//! keyframe). Server-side failures carry a JSON body with an `error` field;
//! its message is preferred over the bare status code when present.

use std::time::Duration;

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::store::StoredSession;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Message taken from the server's `error` body field.
    #[error("{0}")]
    Server(String),
    /// Non-2xx response without a usable error body.
    #[error("HTTP error! status: {0}")]
    Status(u16),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Decode(String),
}

/// One object-count filter attached to a search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectQuery {
    pub label: String,
    pub confidence: f64,
    pub min_instances: u32,
    /// None means "at least min_instances", no upper bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_instances: Option<u32>,
}

/// Search request body.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SearchQuery {
    pub description: String,
    pub objects: Vec<ObjectQuery>,
    pub audio: String,
}

/// One ranked keyframe hit. `fps` may be absent or malformed upstream;
/// consumers sanitize through [`crate::media::sanitize_fps`].
#[derive(Clone, Debug, Deserialize)]
pub struct ResultItem {
    pub video_id: String,
    pub keyframe_index: u32,
    pub fps: Option<f64>,
    pub clip_score: Option<f64>,
}

/// Blocking client bound to one server base URL.
pub struct ApiClient {
    server: String,
    agent: ureq::Agent,
}

impl ApiClient {
    pub fn new(server: &str) -> Self {
        Self {
            server: server.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(15))
                .build(),
        }
    }

    pub fn search(&self, query: &SearchQuery) -> Result<Vec<ResultItem>, ApiError> {
        debug!("search: \"{}\" ({} object filters)", query.description, query.objects.len());
        let results: Vec<ResultItem> = self.post_json("/search", query)?;
        info!("search returned {} results", results.len());
        Ok(results)
    }

    pub fn login(&self) -> Result<StoredSession, ApiError> {
        let session: StoredSession = self.post_json("/api/login", &json!({}))?;
        info!("logged in, evaluation {}", session.evaluation_id);
        Ok(session)
    }

    /// Submit one judged keyframe. `time_ms` is the rounded keyframe
    /// timestamp from [`crate::media::keyframe_time_ms`].
    pub fn submit(
        &self,
        session: &StoredSession,
        video_id: &str,
        time_ms: u64,
    ) -> Result<serde_json::Value, ApiError> {
        let body = json!({
            "sessionId": session.session_id,
            "evaluationId": session.evaluation_id,
            "videoId": video_id,
            "timeMs": time_ms,
        });
        debug!("submit: {video_id} at {time_ms} ms");
        self.post_json("/api/submit", &body)
    }

    fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.server, path);
        match self.agent.post(&url).send_json(body) {
            Ok(response) => response
                .into_json()
                .map_err(|e| ApiError::Decode(e.to_string())),
            Err(ureq::Error::Status(code, response)) => Err(error_from_response(code, response)),
            Err(e) => Err(ApiError::Transport(e.to_string())),
        }
    }
}

/// Turn a non-2xx response into the most specific error available: the
/// body's `error` message when the server sent one, else the status code.
fn error_from_response(code: u16, response: ureq::Response) -> ApiError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<String>,
    }
    if let Ok(body) = response.into_json::<ErrorBody>() {
        if let Some(message) = body.error {
            return ApiError::Server(message);
        }
    }
    ApiError::Status(code)
}
