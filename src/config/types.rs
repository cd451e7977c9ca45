//! Configuration types.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Default backup allowlist.
pub const DEFAULT_TRACKED_KEYS: &[&str] = &[
    "registered_users",
    "currentUser",
    "credit_history",
    "user_metrics",
    "admin_notifications",
    "report_templates",
    "advanced_reports",
    "admin_dashboard_settings",
];

/// Audit log limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditConfig {
    /// Maximum number of entries kept in the log.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Maximum number of entries kept in the critical side list.
    #[serde(default = "default_critical_capacity")]
    pub critical_capacity: usize,
}

fn default_capacity() -> usize {
    10_000
}

fn default_critical_capacity() -> usize {
    100
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            critical_capacity: default_critical_capacity(),
        }
    }
}

/// Backup engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupConfig {
    /// Maximum number of snapshots kept in the index.
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
    /// Days a snapshot stays restorable.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Gzip payloads before storing them.
    #[serde(default = "default_true")]
    pub compress: bool,
    /// Store keys captured in every snapshot.
    #[serde(default = "default_tracked_keys")]
    pub tracked_keys: Vec<String>,
}

fn default_max_backups() -> usize {
    10
}

fn default_retention_days() -> u32 {
    90
}

fn default_true() -> bool {
    true
}

fn default_tracked_keys() -> Vec<String> {
    DEFAULT_TRACKED_KEYS.iter().map(ToString::to_string).collect()
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            max_backups: default_max_backups(),
            retention_days: default_retention_days(),
            compress: true,
            tracked_keys: default_tracked_keys(),
        }
    }
}

/// Daily backup schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Run the scheduler at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Local hour of the daily backup.
    #[serde(default = "default_hour")]
    pub hour: u32,
    /// Local minute of the daily backup.
    #[serde(default)]
    pub minute: u32,
}

fn default_hour() -> u32 {
    2
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hour: default_hour(),
            minute: 0,
        }
    }
}

/// Thresholds for the built-in compliance rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComplianceConfig {
    /// Failed logins tolerated in one window before a violation.
    #[serde(default = "default_failed_login_threshold")]
    pub failed_login_threshold: usize,
    /// Failed admin actions that trigger a violation.
    #[serde(default = "default_failed_admin_threshold")]
    pub failed_admin_threshold: usize,
    /// Data changes tolerated in one window before a violation.
    #[serde(default = "default_bulk_change_threshold")]
    pub bulk_change_threshold: usize,
}

fn default_failed_login_threshold() -> usize {
    5
}

fn default_failed_admin_threshold() -> usize {
    3
}

fn default_bulk_change_threshold() -> usize {
    100
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            failed_login_threshold: default_failed_login_threshold(),
            failed_admin_threshold: default_failed_admin_threshold(),
            bulk_change_threshold: default_bulk_change_threshold(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VaultConfig {
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub compliance: ComplianceConfig,
}

impl VaultConfig {
    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audit.capacity == 0 {
            return Err(ConfigError::Invalid("audit.capacity must be positive".into()));
        }
        if self.audit.critical_capacity == 0 {
            return Err(ConfigError::Invalid(
                "audit.critical_capacity must be positive".into(),
            ));
        }
        if self.backup.max_backups == 0 {
            return Err(ConfigError::Invalid(
                "backup.max_backups must be positive".into(),
            ));
        }
        if let Some(key) = self
            .backup
            .tracked_keys
            .iter()
            .find(|k| k.is_empty() || k.starts_with('_'))
        {
            return Err(ConfigError::Invalid(format!(
                "backup.tracked_keys contains reserved key {key:?}"
            )));
        }
        if self.schedule.hour > 23 {
            return Err(ConfigError::Invalid(format!(
                "schedule.hour out of range: {}",
                self.schedule.hour
            )));
        }
        if self.schedule.minute > 59 {
            return Err(ConfigError::Invalid(format!(
                "schedule.minute out of range: {}",
                self.schedule.minute
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VaultConfig::default();
        assert_eq!(config.audit.capacity, 10_000);
        assert_eq!(config.audit.critical_capacity, 100);
        assert_eq!(config.backup.retention_days, 90);
        assert!(config.backup.compress);
        assert_eq!(config.backup.tracked_keys.len(), 8);
        assert_eq!(config.schedule.hour, 2);
        assert_eq!(config.schedule.minute, 0);
        assert_eq!(config.compliance.failed_login_threshold, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_section_keeps_field_defaults() {
        let toml = r"
            [backup]
            max_backups = 3
        ";
        let config: VaultConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.backup.max_backups, 3);
        assert_eq!(config.backup.retention_days, 90);
        assert!(config.backup.tracked_keys.contains(&"currentUser".to_string()));
    }

    #[test]
    fn test_validate_rejects_bad_hour() {
        let mut config = VaultConfig::default();
        config.schedule.hour = 24;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("schedule.hour"));
    }

    #[test]
    fn test_validate_rejects_reserved_tracked_key() {
        let mut config = VaultConfig::default();
        config.backup.tracked_keys.push("_metadata".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("_metadata"));
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = VaultConfig::default();
        config.audit.capacity = 0;
        assert!(config.validate().is_err());
    }
}
