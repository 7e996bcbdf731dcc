//! State management for the project's cluster
//!
//! Manages the `.simfleet/cloud.json` file which records the settings and
//! session of the cluster currently attached to a project.

use crate::error::{CloudError, Result};
use crate::settings::{CloudSession, CloudSettings};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".simfleet";
const STATE_FILE: &str = "cloud.json";
const STATE_BACKUP: &str = "cloud.json.backup";

/// Persisted settings/session pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudState {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Settings the attached cluster was started with
    pub settings: Option<CloudSettings>,

    /// Session of the attached cluster
    pub session: Option<CloudSession>,
}

impl Default for CloudState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            settings: None,
            session: None,
        }
    }
}

impl CloudState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_settings(&mut self, settings: Option<CloudSettings>) {
        self.settings = settings;
        self.updated_at = Utc::now();
    }

    pub fn set_session(&mut self, session: Option<CloudSession>) {
        self.session = session;
        self.updated_at = Utc::now();
    }

    /// Both halves of the pair are present
    pub fn is_attached(&self) -> bool {
        self.settings.is_some() && self.session.is_some()
    }
}

/// State manager for reading/writing the state file
pub struct StateManager {
    /// Project root directory
    project_root: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    fn state_dir(&self) -> PathBuf {
        self.project_root.join(STATE_DIR)
    }

    /// Get the state file path
    pub fn state_path(&self) -> PathBuf {
        self.state_dir().join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir().join(STATE_BACKUP)
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    /// Load the current state
    pub async fn load(&self) -> Result<CloudState> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("State file not found, returning empty state");
            return Ok(CloudState::new());
        }

        let content = fs::read_to_string(&path).await?;
        let state: CloudState = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!(attached = state.is_attached(), "Loaded cloud state");
        Ok(state)
    }

    /// Save the state, keeping the previous file as a backup
    pub async fn save(&self, state: &CloudState) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let backup = self.backup_path();

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
        }

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&path, content).await?;

        tracing::debug!(attached = state.is_attached(), "Saved cloud state");
        Ok(())
    }
}
