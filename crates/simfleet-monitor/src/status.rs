//! Cluster lifecycle status

use serde::{Deserialize, Serialize};

/// Lifecycle status of the project's cluster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudStatus {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

impl CloudStatus {
    /// Edges of the lifecycle graph
    ///
    /// ```text
    /// Stopped ─▶ Starting ─▶ Running ─▶ Stopping ─▶ Stopped
    ///               │           │
    ///               ▼           ▼
    ///            Stopped      Error ─▶ Stopped
    /// ```
    pub fn can_transition_to(self, next: CloudStatus) -> bool {
        use CloudStatus::*;
        matches!(
            (self, next),
            (Stopped, Starting)
                | (Starting, Running)
                | (Starting, Stopped)
                | (Running, Stopping)
                | (Running, Error)
                | (Stopping, Stopped)
                | (Error, Stopped)
        )
    }

    /// Running or Stopped; no worker is in flight
    pub fn is_settled(self) -> bool {
        matches!(self, CloudStatus::Running | CloudStatus::Stopped)
    }
}

impl std::fmt::Display for CloudStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloudStatus::Stopped => write!(f, "stopped"),
            CloudStatus::Starting => write!(f, "starting"),
            CloudStatus::Running => write!(f, "running"),
            CloudStatus::Stopping => write!(f, "stopping"),
            CloudStatus::Error => write!(f, "error"),
        }
    }
}
