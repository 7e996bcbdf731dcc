//! SimFleet cluster lifecycle orchestration
//!
//! ```text
//! CloudMonitorHandle ──command──▶ orchestrator task ──spawn──▶ workers
//!        ▲                          │    ▲                      │
//!        │ watch / broadcast        │    └──── WorkerReport ────┘
//!        └──────────────────────────┤
//!                                   └──spawn──▶ HealthMonitor (while Running)
//! ```
//!
//! The orchestrator owns `CloudStatus` and is the only writer of the
//! project's settings/session pair. Workers and the health monitor run on
//! their own tasks and report back over a channel.

pub mod context;
pub mod factory;
pub mod health;
pub mod monitor;
pub mod status;
pub mod workers;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use context::{FileProjectContext, PersistedCluster, ProjectContext};
pub use factory::{BackendFactory, ProviderFactory};
pub use health::{ConnectionDiagnostics, HealthCheck, HealthMonitor, InternetDebounce, TickOutcome};
pub use monitor::{CloudEvent, CloudMonitor, CloudMonitorHandle, ConnectionLostHandler, LogConnectionLost};
pub use status::CloudStatus;
