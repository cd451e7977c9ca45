//! Configuration file loader.

use std::path::PathBuf;

use super::VaultConfig;

/// Configuration loader that searches multiple locations.
#[derive(Debug)]
pub struct ConfigLoader {
    /// Search paths in order of priority.
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default search paths.
    #[must_use]
    pub fn new() -> Self {
        let mut search_paths = Vec::new();

        // 1. Current directory: .audit-vault.toml
        search_paths.push(PathBuf::from(".audit-vault.toml"));

        // 2. User config directory: ~/.config/audit-vault/config.toml
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("audit-vault").join("config.toml"));
        }

        Self { search_paths }
    }

    /// Create a config loader with a specific config file path.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            search_paths: vec![path],
        }
    }

    /// Load configuration from the first available file, or return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed or fails validation.
    pub fn load(&self) -> Result<VaultConfig, ConfigError> {
        for path in &self.search_paths {
            if path.exists() {
                tracing::debug!(path = %path.display(), "Loading config file");
                let config = Self::load_from_path(path)?;
                config.validate()?;
                return Ok(config);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(VaultConfig::default())
    }

    fn load_from_path(path: &PathBuf) -> Result<VaultConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.clone(),
            source: e,
        })
    }

    /// Get the search paths for debugging.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Find the first config file that exists.
    #[must_use]
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths.iter().find(|p| p.exists()).cloned()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_loader_default_paths() {
        let loader = ConfigLoader::new();
        assert!(!loader.search_paths().is_empty());
        assert!(loader.search_paths()[0].ends_with(".audit-vault.toml"));
    }

    #[test]
    fn test_config_loader_returns_defaults_when_no_file() {
        let loader = ConfigLoader::with_path(PathBuf::from("/nonexistent/path.toml"));
        let config = loader.load().unwrap();
        assert_eq!(config, VaultConfig::default());
        assert!(loader.find_config_file().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [audit]
            capacity = 500

            [backup]
            retention_days = 30
            compress = false
            tracked_keys = ["currentUser"]

            [schedule]
            hour = 4
            minute = 30
        "#,
        )
        .unwrap();

        let config = ConfigLoader::with_path(path.clone()).load().unwrap();
        assert_eq!(config.audit.capacity, 500);
        assert_eq!(config.backup.retention_days, 30);
        assert!(!config.backup.compress);
        assert_eq!(config.backup.tracked_keys, vec!["currentUser".to_string()]);
        assert_eq!(config.schedule.hour, 4);
        assert_eq!(config.schedule.minute, 30);
        assert_eq!(ConfigLoader::with_path(path.clone()).find_config_file(), Some(path));
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[audit\ncapacity = ").unwrap();

        let err = ConfigLoader::with_path(path).load().unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[schedule]\nminute = 75\n").unwrap();

        let err = ConfigLoader::with_path(path).load().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
