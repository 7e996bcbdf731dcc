//! Local-virtualized provider for SimFleet
//!
//! This crate implements the CloudProvider trait with Vagrant machines on
//! the local host: one Vagrantfile directory for the coordinator and one
//! for the worker pool.
//!
//! # Requirements
//!
//! - `vagrant` CLI must be installed with a working box provider
//! - Coordinator and worker ports must be forwarded to the host

pub mod error;
pub mod provider;
pub mod vagrant;

pub use error::{Result, VagrantError};
pub use provider::VagrantProvider;
pub use vagrant::{MachineStatus, Vagrant};
