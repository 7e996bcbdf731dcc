//! Cluster settings and session types
//!
//! `CloudSettings` is the static configuration used to create a cluster,
//! `CloudSession` the live identifiers of a started one. Both are tagged
//! with the backend kind, and a session must always pair with settings of
//! the same kind.

use crate::error::{CloudError, Result};
use crate::probe::DEFAULT_INTERNET_CHECK_URL;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Backend kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CloudKind {
    /// EC2 instances
    ManagedCloud,
    /// Vagrant machines on the local host
    LocalVirtualized,
}

impl CloudKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloudKind::ManagedCloud => "managed-cloud",
            CloudKind::LocalVirtualized => "local-virtualized",
        }
    }
}

impl std::fmt::Display for CloudKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloudKind {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "managed-cloud" | "aws" => Ok(CloudKind::ManagedCloud),
            "local-virtualized" | "vagrant" => Ok(CloudKind::LocalVirtualized),
            other => Err(CloudError::InvalidConfig(format!(
                "unknown backend kind: {}",
                other
            ))),
        }
    }
}

/// Static configuration for a cluster, tagged by backend kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CloudSettings {
    ManagedCloud(AwsSettings),
    LocalVirtualized(VagrantSettings),
}

impl CloudSettings {
    pub fn kind(&self) -> CloudKind {
        match self {
            CloudSettings::ManagedCloud(_) => CloudKind::ManagedCloud,
            CloudSettings::LocalVirtualized(_) => CloudKind::LocalVirtualized,
        }
    }
}

/// Live identifiers of a started cluster, tagged by backend kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CloudSession {
    ManagedCloud(AwsSession),
    LocalVirtualized(VagrantSession),
}

impl CloudSession {
    pub fn kind(&self) -> CloudKind {
        match self {
            CloudSession::ManagedCloud(_) => CloudKind::ManagedCloud,
            CloudSession::LocalVirtualized(_) => CloudKind::LocalVirtualized,
        }
    }

    /// Coordinator endpoint, once known
    pub fn server_url(&self) -> Option<&str> {
        match self {
            CloudSession::ManagedCloud(s) => s.server_url.as_deref(),
            CloudSession::LocalVirtualized(s) => s.server_url.as_deref(),
        }
    }

    /// Worker endpoints derived from the started pool
    pub fn worker_urls(&self) -> &[String] {
        match self {
            CloudSession::ManagedCloud(s) => &s.worker_urls,
            CloudSession::LocalVirtualized(s) => &s.worker_urls,
        }
    }
}

/// Fails with `KindMismatch` when a session is paired with settings of
/// another backend kind.
pub fn ensure_matching(settings: &CloudSettings, session: Option<&CloudSession>) -> Result<()> {
    match session {
        Some(session) if session.kind() != settings.kind() => Err(CloudError::KindMismatch {
            settings: settings.kind(),
            session: session.kind(),
        }),
        _ => Ok(()),
    }
}

/// Settings for the managed-cloud (EC2) backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsSettings {
    /// Name used to tag every instance of the cluster
    pub cluster_name: String,

    /// AWS region (e.g. "us-east-1")
    pub region: String,

    /// AMI used for both coordinator and workers
    pub ami: String,

    /// Instance type of the coordinator
    pub server_instance_type: String,

    /// Instance type of each worker
    pub worker_instance_type: String,

    /// Number of worker instances
    pub worker_count: u32,

    /// EC2 key pair name
    pub key_name: Option<String>,

    /// Security group ID
    pub security_group: Option<String>,

    /// Port of the coordinator service
    pub service_port: u16,

    /// Seconds between readiness polls
    pub poll_interval_secs: u64,

    /// URL used to check internet reachability
    pub internet_check_url: String,
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            cluster_name: "simfleet".to_string(),
            region: "us-east-1".to_string(),
            ami: String::new(),
            server_instance_type: "m5.large".to_string(),
            worker_instance_type: "c5.xlarge".to_string(),
            worker_count: 2,
            key_name: None,
            security_group: None,
            service_port: 8080,
            poll_interval_secs: 10,
            internet_check_url: DEFAULT_INTERNET_CHECK_URL.to_string(),
        }
    }
}

/// Session of a managed-cloud cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsSession {
    pub server_id: Option<String>,
    pub server_url: Option<String>,
    pub worker_ids: Vec<String>,
    pub worker_urls: Vec<String>,
}

/// Settings for the local-virtualized (Vagrant) backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VagrantSettings {
    /// Directory holding the coordinator Vagrantfile
    pub server_path: PathBuf,

    /// Coordinator service endpoint as forwarded to the host
    pub server_url: String,

    /// Directory holding the worker Vagrantfile
    pub worker_path: PathBuf,

    /// Worker endpoint as forwarded to the host
    pub worker_url: String,

    /// Halt machines on stop instead of destroying them
    pub halt_on_stop: bool,

    /// Seconds between readiness polls
    pub poll_interval_secs: u64,

    /// URL used to check internet reachability
    pub internet_check_url: String,
}

impl Default for VagrantSettings {
    fn default() -> Self {
        Self {
            server_path: PathBuf::from("vagrant/server"),
            server_url: "http://localhost:8080".to_string(),
            worker_path: PathBuf::from("vagrant/worker"),
            worker_url: "http://localhost:8081".to_string(),
            halt_on_stop: true,
            poll_interval_secs: 5,
            internet_check_url: DEFAULT_INTERNET_CHECK_URL.to_string(),
        }
    }
}

/// Session of a local-virtualized cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VagrantSession {
    pub server_url: Option<String>,
    pub worker_urls: Vec<String>,
}
