//! Project context: the authoritative home of the settings/session pair

use async_trait::async_trait;
use simfleet_cloud::{CloudSession, CloudSettings, CloudState, Result, StateManager};
use std::path::Path;
use tokio::sync::Mutex;

/// Access to the current project's cluster settings and session.
///
/// The orchestrator reads and writes the pair only through this trait and
/// never caches it, so project-level persistence stays authoritative.
#[async_trait]
pub trait ProjectContext: Send + Sync {
    /// Fresh settings built from the project's defaults
    async fn default_settings(&self) -> CloudSettings;

    async fn settings(&self) -> Option<CloudSettings>;

    async fn set_settings(&self, settings: Option<CloudSettings>);

    async fn session(&self) -> Option<CloudSession>;

    async fn set_session(&self, session: Option<CloudSession>);

    /// Write the current pair to durable storage
    async fn persist(&self) -> Result<()>;
}

/// Settings and session of an attached cluster
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedCluster {
    pub settings: CloudSettings,
    pub session: CloudSession,
}

impl PersistedCluster {
    /// Read the pair; `None` unless both halves are present
    pub async fn load(context: &dyn ProjectContext) -> Option<Self> {
        let settings = context.settings().await?;
        let session = context.session().await?;
        Some(Self { settings, session })
    }
}

/// Project context stored under `<project>/.simfleet/cloud.json`
pub struct FileProjectContext {
    manager: StateManager,
    defaults: CloudSettings,
    state: Mutex<CloudState>,
}

impl FileProjectContext {
    /// Load the project's state file, or start empty when it does not exist
    pub async fn open(project_root: impl AsRef<Path>, defaults: CloudSettings) -> Result<Self> {
        let manager = StateManager::new(project_root);
        let state = manager.load().await?;
        Ok(Self {
            manager,
            defaults,
            state: Mutex::new(state),
        })
    }

    /// Snapshot of the in-memory state
    pub async fn snapshot(&self) -> CloudState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl ProjectContext for FileProjectContext {
    async fn default_settings(&self) -> CloudSettings {
        self.defaults.clone()
    }

    async fn settings(&self) -> Option<CloudSettings> {
        self.state.lock().await.settings.clone()
    }

    async fn set_settings(&self, settings: Option<CloudSettings>) {
        self.state.lock().await.set_settings(settings);
    }

    async fn session(&self) -> Option<CloudSession> {
        self.state.lock().await.session.clone()
    }

    async fn set_session(&self, session: Option<CloudSession>) {
        self.state.lock().await.set_session(session);
    }

    async fn persist(&self) -> Result<()> {
        let state = self.state.lock().await.clone();
        self.manager.save(&state).await
    }
}
