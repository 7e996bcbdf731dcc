pub mod error;
pub mod model;

pub use error::*;
pub use model::{MonitorSettings, SimfleetConfig};

use std::path::{Path, PathBuf};

const CONFIG_ENV: &str = "SIMFLEET_CONFIG";
const CANDIDATES: [&str; 2] = ["simfleet.local.yaml", "simfleet.yaml"];

/// SimFleet's global config directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("simfleet");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Find the project's simfleet.yaml
///
/// Search order:
/// 1. SIMFLEET_CONFIG environment variable (direct path)
/// 2. Current directory: simfleet.local.yaml, simfleet.yaml
/// 3. ./.simfleet/ directory, same order
/// 4. ~/.config/simfleet/simfleet.yaml (global)
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;

    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let project_dir = current_dir.join(".simfleet");
    if project_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = project_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("simfleet").join("simfleet.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// Parse a config file
pub fn load_config(path: &Path) -> Result<SimfleetConfig> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(SimfleetConfig::default());
    }

    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the discovered config, falling back to defaults when none exists
pub fn load() -> Result<SimfleetConfig> {
    match find_config_file() {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "Loading config");
            load_config(&path)
        }
        Err(ConfigError::ConfigFileNotFound) => {
            tracing::debug!("No config file found, using defaults");
            Ok(SimfleetConfig::default())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use simfleet_cloud::{CloudKind, CloudSettings};
    use std::fs;

    #[test]
    #[serial]
    fn test_find_config_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("simfleet.yaml"), "{}").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config_file();
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with("simfleet.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_config_file_local_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("simfleet.yaml"), "{}").unwrap();
        fs::write(temp_dir.path().join("simfleet.local.yaml"), "{}").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config_file();
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with("simfleet.local.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_config_file_in_project_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        let project_dir = temp_dir.path().join(".simfleet");
        fs::create_dir(&project_dir).unwrap();
        fs::write(project_dir.join("simfleet.yaml"), "{}").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config_file();
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with(".simfleet/simfleet.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_config_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, "{}").unwrap();

        unsafe {
            std::env::set_var(CONFIG_ENV, config_path.to_str().unwrap());
        }

        let result = find_config_file();

        unsafe {
            std::env::remove_var(CONFIG_ENV);
        }

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_load_config_with_overrides() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("simfleet.yaml");
        fs::write(
            &path,
            r#"
default_backend: managed-cloud
aws:
  region: eu-west-1
  ami: ami-0abc
  worker_count: 4
monitor:
  health_period_secs: 10
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.default_backend, CloudKind::ManagedCloud);
        assert_eq!(config.monitor.health_period_secs, 10);
        assert_eq!(config.monitor.failure_threshold, 3);

        match config.default_settings() {
            CloudSettings::ManagedCloud(aws) => {
                assert_eq!(aws.region, "eu-west-1");
                assert_eq!(aws.worker_count, 4);
                assert_eq!(aws.service_port, 8080);
            }
            other => panic!("Expected managed-cloud settings, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_config_is_default() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("simfleet.yaml");
        fs::write(&path, "\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config, SimfleetConfig::default());
        assert_eq!(config.monitor.service_probe_attempts, 15);
        assert_eq!(config.default_settings().kind(), CloudKind::LocalVirtualized);
    }

    #[test]
    fn test_invalid_config_reports_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("simfleet.yaml");
        fs::write(&path, "default_backend: gcp\n").unwrap();

        match load_config(&path) {
            Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }
}
