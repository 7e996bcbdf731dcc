//! EC2 provider error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("aws CLI not found. Please install: https://aws.amazon.com/cli/")]
    AwsCliNotFound,

    #[error("aws authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("aws command failed: {0}")]
    CommandFailed(String),

    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Instance {id} entered unexpected state: {state}")]
    UnexpectedState { id: String, state: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AwsError>;

impl From<AwsError> for simfleet_cloud::CloudError {
    fn from(e: AwsError) -> Self {
        use simfleet_cloud::CloudError;
        match e {
            AwsError::AuthenticationFailed(msg) => CloudError::AuthenticationFailed(msg),
            AwsError::CommandFailed(msg) => CloudError::CommandFailed(msg),
            AwsError::AwsCliNotFound => {
                CloudError::CommandFailed("aws CLI not found".to_string())
            }
            AwsError::InvalidConfig(msg) => CloudError::InvalidConfig(msg),
            AwsError::JsonError(e) => CloudError::Json(e),
            AwsError::IoError(e) => CloudError::Io(e),
            other => CloudError::ApiError(other.to_string()),
        }
    }
}
