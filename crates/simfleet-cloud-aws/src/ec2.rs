//! aws CLI wrapper
//!
//! Wraps the `aws ec2` and `aws sts` commands used to run a cluster.

use crate::error::{AwsError, Result};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;

const CLUSTER_TAG: &str = "simfleet:cluster";
const ROLE_TAG: &str = "simfleet:role";

/// aws CLI wrapper bound to one region
pub struct Ec2Cli {
    region: String,
}

impl Ec2Cli {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }

    /// Check that the CLI is installed and return the caller identity
    pub async fn caller_identity(&self) -> Result<CallerIdentity> {
        let which = Command::new("which").arg("aws").output().await?;

        if !which.status.success() {
            return Err(AwsError::AwsCliNotFound);
        }

        let output = self
            .run_command(&["sts", "get-caller-identity", "--output", "json"])
            .await
            .map_err(|e| match e {
                AwsError::CommandFailed(msg) => AwsError::AuthenticationFailed(msg),
                other => other,
            })?;

        let identity: CallerIdentity = serde_json::from_str(&output)?;
        Ok(identity)
    }

    /// Run an aws command and return stdout
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("aws");
        cmd.arg("--region").arg(&self.region);
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: aws --region {} {}", self.region, args.join(" "));

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AwsError::CommandFailed(stderr.to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Launch `config.count` instances tagged with the cluster name and role
    pub async fn run_instances(&self, config: &RunInstancesConfig) -> Result<Vec<InstanceInfo>> {
        if config.image_id.is_empty() {
            return Err(AwsError::InvalidConfig("ami must be set".to_string()));
        }

        let count = config.count.to_string();
        let tags = format!(
            "ResourceType=instance,Tags=[{{Key={},Value={}}},{{Key={},Value={}}}]",
            CLUSTER_TAG, config.cluster_name, ROLE_TAG, config.role
        );

        let mut args = vec![
            "ec2",
            "run-instances",
            "--image-id",
            config.image_id.as_str(),
            "--instance-type",
            config.instance_type.as_str(),
            "--count",
            count.as_str(),
            "--tag-specifications",
            tags.as_str(),
            "--output",
            "json",
        ];

        if let Some(ref key_name) = config.key_name {
            args.push("--key-name");
            args.push(key_name.as_str());
        }

        if let Some(ref group) = config.security_group {
            args.push("--security-group-ids");
            args.push(group.as_str());
        }

        let output = self.run_command(&args).await?;
        let launched: RunInstancesOutput = serde_json::from_str(&output)?;
        Ok(launched.instances)
    }

    /// Describe the given instances.
    ///
    /// EC2 is eventually consistent: right after `run-instances` the IDs can
    /// be unknown to `describe-instances`, and long after termination they
    /// are forgotten. Unknown IDs yield an empty list instead of an error.
    pub async fn describe_instances(&self, ids: &[String]) -> Result<Vec<InstanceInfo>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut args = vec!["ec2", "describe-instances", "--output", "json", "--instance-ids"];
        args.extend(ids.iter().map(String::as_str));

        let output = match self.run_command(&args).await {
            Ok(output) => output,
            Err(AwsError::CommandFailed(stderr)) if is_instance_not_found(&stderr) => {
                tracing::debug!(ids = ?ids, "Instances not visible to describe-instances");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        let described: DescribeInstancesOutput = serde_json::from_str(&output)?;

        Ok(described
            .reservations
            .into_iter()
            .flat_map(|r| r.instances)
            .collect())
    }

    /// Terminate the given instances
    pub async fn terminate_instances(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut args = vec!["ec2", "terminate-instances", "--output", "json", "--instance-ids"];
        args.extend(ids.iter().map(String::as_str));

        self.run_command(&args).await?;
        Ok(())
    }
}

/// Whether aws CLI stderr reports unknown instance IDs
fn is_instance_not_found(stderr: &str) -> bool {
    stderr.contains("InvalidInstanceID.NotFound")
}

/// Configuration for launching instances
#[derive(Debug, Clone)]
pub struct RunInstancesConfig {
    pub cluster_name: String,
    pub role: String,
    pub image_id: String,
    pub instance_type: String,
    pub count: u32,
    pub key_name: Option<String>,
    pub security_group: Option<String>,
}

/// Identity returned by `aws sts get-caller-identity`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RunInstancesOutput {
    #[serde(default)]
    instances: Vec<InstanceInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesOutput {
    #[serde(default)]
    reservations: Vec<Reservation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    #[serde(default)]
    instances: Vec<InstanceInfo>,
}

/// Instance information from the EC2 API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceInfo {
    pub instance_id: String,

    pub state: InstanceState,

    #[serde(default)]
    pub public_dns_name: Option<String>,

    #[serde(default)]
    pub public_ip_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceState {
    pub name: String,
}

impl InstanceInfo {
    pub fn is_running(&self) -> bool {
        self.state.name == "running"
    }

    pub fn is_terminated(&self) -> bool {
        self.state.name == "terminated"
    }

    /// Entered a state it will not leave on its own towards running
    pub fn is_failed_start(&self) -> bool {
        matches!(self.state.name.as_str(), "shutting-down" | "terminated" | "stopped")
    }

    /// Public host name, falling back to the public IP
    pub fn public_host(&self) -> Option<String> {
        self.public_dns_name
            .clone()
            .filter(|h| !h.is_empty())
            .or_else(|| self.public_ip_address.clone())
    }
}
