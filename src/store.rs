//! Persisted evaluation-server credentials.
//!
//! Login returns a `sessionId`/`evaluationId` pair that must survive
//! restarts; submits without them are rejected up front. Stored as JSON in
//! the platform config dir (or the `--config-dir` override).

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::paths::{self, PathConfig};

const SESSION_FILE: &str = "session.json";

/// Credentials returned by login, required by submit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "evaluationId")]
    pub evaluation_id: String,
}

/// JSON-file-backed session persistence.
pub struct SessionStore {
    file: PathBuf,
}

impl SessionStore {
    pub fn new(config: &PathConfig) -> Self {
        Self {
            file: paths::config_file(SESSION_FILE, config),
        }
    }

    /// Load the stored session, if any. A missing or unreadable file is not
    /// an error; it just means no one has logged in yet.
    pub fn load(&self) -> Option<StoredSession> {
        let data = std::fs::read_to_string(&self.file).ok()?;
        match serde_json::from_str(&data) {
            Ok(session) => Some(session),
            Err(err) => {
                debug!("ignoring malformed session file {}: {}", self.file.display(), err);
                None
            }
        }
    }

    pub fn save(&self, session: &StoredSession) -> Result<()> {
        if let Some(parent) = self.file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.file, json)
            .with_context(|| format!("Failed to write {}", self.file.display()))?;
        info!("session saved to {}", self.file.display());
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.file) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", self.file.display())),
        }
    }
}
