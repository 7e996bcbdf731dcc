//! Cloud provider trait definition

use crate::error::Result;
use crate::settings::{CloudKind, CloudSession, CloudSettings};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Cluster provider abstraction trait
///
/// A provider is bound to one settings value and, once a cluster exists,
/// to the session describing it. Request methods return whether the
/// backend accepted the request; the matching `wait_for_*` call blocks
/// until the backend reports the requested state.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Backend kind of this provider
    fn kind(&self) -> CloudKind;

    /// Settings the provider was built from
    fn settings(&self) -> CloudSettings;

    /// Current session, if any part of the cluster has been started
    fn session(&self) -> Option<CloudSession>;

    /// Ask the backend to start the coordinator
    async fn request_start_server(&mut self) -> Result<bool>;

    /// Block until the coordinator is ready
    async fn wait_for_server(&mut self) -> Result<()>;

    /// Ask the backend to start the worker pool
    async fn request_start_workers(&mut self) -> Result<bool>;

    /// Block until every worker is ready
    async fn wait_for_workers(&mut self) -> Result<()>;

    /// Ask the backend to tear down the cluster
    async fn request_terminate(&mut self) -> Result<bool>;

    /// Block until termination is complete
    async fn wait_for_terminated(&mut self) -> Result<()>;

    /// Whether the control plane reports the coordinator running
    async fn server_running(&self) -> Result<bool>;

    /// Whether the control plane reports every worker running
    async fn workers_running(&self) -> Result<bool>;

    /// Lightweight connectivity probe
    async fn internet_available(&self) -> bool;

    /// Check that the backend credentials are valid
    async fn check_auth(&self) -> Result<AuthStatus>;

    /// Coordinator and worker pool both running
    async fn cluster_running(&self) -> Result<bool> {
        Ok(self.server_running().await? && self.workers_running().await?)
    }
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Account/user information if available
    pub account_info: Option<String>,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}
