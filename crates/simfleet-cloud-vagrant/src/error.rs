//! Vagrant provider error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VagrantError {
    #[error("vagrant not found. Please install: https://developer.hashicorp.com/vagrant/install")]
    VagrantNotFound,

    #[error("vagrant command failed: {0}")]
    CommandFailed(String),

    #[error("Machine in {} is not running", .0.display())]
    MachineNotRunning(PathBuf),

    #[error("Vagrant task aborted: {0}")]
    TaskAborted(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VagrantError>;

impl From<VagrantError> for simfleet_cloud::CloudError {
    fn from(e: VagrantError) -> Self {
        use simfleet_cloud::CloudError;
        match e {
            VagrantError::CommandFailed(msg) => CloudError::CommandFailed(msg),
            VagrantError::IoError(e) => CloudError::Io(e),
            other => CloudError::ApiError(other.to_string()),
        }
    }
}
