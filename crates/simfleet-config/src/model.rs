//! Configuration file model

use serde::{Deserialize, Serialize};
use simfleet_cloud::{AwsSettings, CloudKind, CloudSettings, VagrantSettings};
use std::time::Duration;

/// Contents of `simfleet.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimfleetConfig {
    /// Backend used when starting a fresh cluster
    pub default_backend: CloudKind,

    pub aws: AwsSettings,

    pub vagrant: VagrantSettings,

    pub monitor: MonitorSettings,
}

impl Default for SimfleetConfig {
    fn default() -> Self {
        Self {
            default_backend: CloudKind::LocalVirtualized,
            aws: AwsSettings::default(),
            vagrant: VagrantSettings::default(),
            monitor: MonitorSettings::default(),
        }
    }
}

impl SimfleetConfig {
    /// Fresh settings for a new cluster of the default backend
    pub fn default_settings(&self) -> CloudSettings {
        match self.default_backend {
            CloudKind::ManagedCloud => CloudSettings::ManagedCloud(self.aws.clone()),
            CloudKind::LocalVirtualized => CloudSettings::LocalVirtualized(self.vagrant.clone()),
        }
    }
}

/// Lifecycle and health monitoring knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Seconds between health ticks
    pub health_period_secs: u64,

    /// Consecutive service probe failures before a connection error
    pub failure_threshold: u32,

    /// Agreeing internet readings required to flip the reported value
    pub internet_debounce: usize,

    /// Service probe attempts after a start
    pub service_probe_attempts: u32,

    /// Seconds between service probe attempts after a start
    pub service_probe_pause_secs: u64,

    /// Timeout of a single HTTP probe
    pub probe_timeout_secs: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            health_period_secs: 5,
            failure_threshold: 3,
            internet_debounce: 3,
            service_probe_attempts: 15,
            service_probe_pause_secs: 3,
            probe_timeout_secs: 5,
        }
    }
}

impl MonitorSettings {
    pub fn health_period(&self) -> Duration {
        Duration::from_secs(self.health_period_secs.max(1))
    }

    pub fn service_probe_pause(&self) -> Duration {
        Duration::from_secs(self.service_probe_pause_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }
}
