//! Managed-cloud provider for SimFleet
//!
//! This crate implements the CloudProvider trait on top of EC2: one
//! coordinator instance and a pool of worker instances, all tagged with
//! the cluster name.
//!
//! # Requirements
//!
//! - `aws` CLI must be installed and configured
//! - Credentials are resolved by the CLI (profile, environment, SSO)
//!
//! # Example
//!
//! ```ignore
//! use simfleet_cloud::{AwsSettings, CloudProvider};
//! use simfleet_cloud_aws::AwsProvider;
//!
//! let mut provider = AwsProvider::new(AwsSettings::default());
//!
//! if provider.request_start_server().await? {
//!     provider.wait_for_server().await?;
//! }
//! ```

pub mod ec2;
pub mod error;
pub mod provider;

pub use ec2::{CallerIdentity, Ec2Cli, InstanceInfo, RunInstancesConfig};
pub use error::{AwsError, Result};
pub use provider::AwsProvider;
