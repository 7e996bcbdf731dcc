//! SimFleet Cloud Infrastructure
//!
//! This crate provides the provider abstraction for SimFleet clusters:
//! one coordinator node plus a pool of worker nodes that back batch
//! simulation runs.
//!
//! # Supported Backends
//!
//! - **managed-cloud**: EC2 instances (via aws CLI)
//! - **local-virtualized**: Vagrant machines on the local host (via vagrant CLI)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                simfleet-monitor                  │
//! │        (lifecycle orchestrator, health)          │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 simfleet-cloud                   │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │          Provider Abstraction             │   │
//! │  │  trait CloudProvider { ... }              │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────────┐  ┌──────────────┐        │
//! │  │ Settings/Session │  │  State Mgmt  │        │
//! │  └──────────────────┘  └──────────────┘        │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │ managed-cloud │ │local-virtual. │
//! │   (aws cli)   │ │ (vagrant cli) │
//! └───────────────┘ └───────────────┘
//! ```

pub mod error;
pub mod probe;
pub mod provider;
pub mod settings;
pub mod state;

// Re-exports
pub use error::{CloudError, Result};
pub use probe::{DEFAULT_INTERNET_CHECK_URL, HttpServiceProbe, ServiceProbe};
pub use provider::{AuthStatus, CloudProvider};
pub use settings::{
    AwsSession, AwsSettings, CloudKind, CloudSession, CloudSettings, VagrantSession,
    VagrantSettings, ensure_matching,
};
pub use state::{CloudState, StateManager};
