use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error(
        "Config file not found. Looked in:\n\
        - current directory: simfleet.local.yaml, simfleet.yaml\n\
        - ./.simfleet/ directory\n\
        - ~/.config/simfleet/simfleet.yaml\n\
        Set SIMFLEET_CONFIG to point at a file directly"
    )]
    ConfigFileNotFound,

    #[error("Invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
