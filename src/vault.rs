//! Application root wiring the components over one store and clock.

use std::sync::Arc;

use crate::audit::AuditRecorder;
use crate::backup::BackupEngine;
use crate::clock::Clock;
use crate::compliance::ComplianceAnalyzer;
use crate::config::VaultConfig;
use crate::export::ExportWriter;
use crate::scheduler::{BackupScheduler, SchedulerError};
use crate::store::KeyValueStore;

/// Owns the recorder, backup engine, analyzer, exporter and the optional daily scheduler.
pub struct AuditVault {
    config: VaultConfig,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    recorder: Arc<AuditRecorder>,
    engine: Arc<BackupEngine>,
    analyzer: ComplianceAnalyzer,
    exporter: ExportWriter,
    scheduler: Option<BackupScheduler>,
}

impl AuditVault {
    #[must_use]
    pub fn new(config: VaultConfig, store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        let recorder = Arc::new(AuditRecorder::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            &config.audit,
        ));
        let engine = Arc::new(BackupEngine::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            Arc::clone(&recorder),
            config.backup.clone(),
        ));
        let analyzer = ComplianceAnalyzer::new(Arc::clone(&recorder), &config.compliance);
        let exporter = ExportWriter::new(Arc::clone(&recorder), Arc::clone(&clock));

        Self {
            config,
            store,
            clock,
            recorder,
            engine,
            analyzer,
            exporter,
            scheduler: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    #[must_use]
    pub fn recorder(&self) -> &Arc<AuditRecorder> {
        &self.recorder
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<BackupEngine> {
        &self.engine
    }

    #[must_use]
    pub fn analyzer(&self) -> &ComplianceAnalyzer {
        &self.analyzer
    }

    /// Replace the analyzer, e.g. to add custom rules.
    pub fn set_analyzer(&mut self, analyzer: ComplianceAnalyzer) {
        self.analyzer = analyzer;
    }

    #[must_use]
    pub fn exporter(&self) -> &ExportWriter {
        &self.exporter
    }

    #[must_use]
    pub fn scheduler(&self) -> Option<&BackupScheduler> {
        self.scheduler.as_ref()
    }

    /// Start the daily backup job. Returns `false` when scheduling is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyRunning`] if it was already started.
    pub fn start_scheduler(&mut self) -> Result<bool, SchedulerError> {
        if !self.config.schedule.enabled {
            tracing::info!("Backup schedule disabled");
            return Ok(false);
        }
        if self.scheduler.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }
        let mut scheduler = BackupScheduler::new(
            Arc::clone(&self.engine),
            Arc::clone(&self.clock),
            &self.config.schedule,
        );
        scheduler.start()?;
        self.scheduler = Some(scheduler);
        Ok(true)
    }

    /// Stop the scheduler, if running, and wait for it to exit.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Join`] if the background task panicked.
    pub async fn shutdown(&mut self) -> Result<(), SchedulerError> {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.shutdown().await?;
        }
        tracing::debug!("Audit vault shut down");
        Ok(())
    }
}

impl std::fmt::Debug for AuditVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditVault")
            .field("config", &self.config)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditInput;
    use crate::clock::SystemClock;
    use crate::config::ScheduleConfig;
    use crate::scheduler::SchedulerState;
    use crate::store::MemoryStore;

    fn vault(config: VaultConfig) -> AuditVault {
        AuditVault::new(config, Arc::new(MemoryStore::new()), Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn test_components_share_the_recorder() {
        let vault = vault(VaultConfig::default());
        vault
            .recorder()
            .record(AuditInput::builder("u1", "u1@example.com", "login", "session").build())
            .await
            .unwrap();

        let stats = vault.analyzer().audit_stats().await.unwrap();
        assert_eq!(stats.total_logs, 1);
    }

    #[tokio::test]
    async fn test_disabled_schedule_does_not_start() {
        let mut vault = vault(VaultConfig {
            schedule: ScheduleConfig {
                enabled: false,
                ..ScheduleConfig::default()
            },
            ..VaultConfig::default()
        });
        assert!(!vault.start_scheduler().unwrap());
        assert!(vault.scheduler().is_none());
    }

    #[tokio::test]
    async fn test_start_scheduler_twice_fails() {
        let mut vault = vault(VaultConfig::default());
        assert!(vault.start_scheduler().unwrap());
        assert_eq!(
            vault.scheduler().map(BackupScheduler::state),
            Some(SchedulerState::Waiting)
        );
        assert!(matches!(
            vault.start_scheduler(),
            Err(SchedulerError::AlreadyRunning)
        ));

        vault.shutdown().await.unwrap();
        assert!(vault.scheduler().is_none());
    }
}
