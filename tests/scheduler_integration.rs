//! Integration tests for the daily backup scheduler on a paused tokio clock.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use audit_vault::backup::BackupType;
use audit_vault::clock::{Clock, ManualClock};
use audit_vault::config::{ScheduleConfig, VaultConfig};
use audit_vault::scheduler::{BackupScheduler, SchedulerError, SchedulerState, SCHEDULED_DESCRIPTION};
use audit_vault::store::{KeyValueStore, MemoryStore, BACKUP_INDEX_KEY};
use audit_vault::AuditVault;
use chrono::{TimeZone, Utc};

const DAY: StdDuration = StdDuration::from_secs(24 * 60 * 60);

async fn vault() -> (AuditVault, MemoryStore, ManualClock) {
    let store = MemoryStore::new();
    store
        .set("currentUser", r#"{"id":1}"#)
        .await
        .expect("seed");
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap());
    let config = VaultConfig {
        schedule: ScheduleConfig {
            enabled: true,
            hour: 2,
            minute: 0,
        },
        ..VaultConfig::default()
    };
    let vault = AuditVault::new(config, Arc::new(store.clone()), Arc::new(clock.clone()));
    (vault, store, clock)
}

fn first_delay(vault: &AuditVault, clock: &ManualClock) -> StdDuration {
    let next = vault
        .scheduler()
        .expect("scheduler started")
        .status()
        .next_fire()
        .expect("next fire");
    (next - clock.now()).to_std().expect("fire time is ahead")
}

/// Test that the job fires at the scheduled time and then every day.
#[tokio::test(start_paused = true)]
async fn test_fires_at_time_then_daily() {
    let (mut vault, _store, clock) = vault().await;
    assert!(vault.start_scheduler().expect("start"));
    let delay = first_delay(&vault, &clock);
    assert!(delay <= DAY + StdDuration::from_secs(3600));

    tokio::time::sleep(delay - StdDuration::from_secs(1)).await;
    assert!(vault.engine().list_backups().await.expect("list").is_empty());

    tokio::time::sleep(StdDuration::from_secs(2)).await;
    let backups = vault.engine().list_backups().await.expect("list");
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].backup_type, BackupType::Incremental);
    assert_eq!(backups[0].metadata.description, SCHEDULED_DESCRIPTION);

    let status = vault.scheduler().expect("scheduler").status();
    assert_eq!(status.state(), SchedulerState::Recurring);
    assert_eq!(status.runs(), 1);

    tokio::time::sleep(DAY).await;
    assert_eq!(vault.engine().list_backups().await.expect("list").len(), 2);

    vault.shutdown().await.expect("shutdown");
}

/// Test that stopping before the first fire cancels the pending timer.
#[tokio::test(start_paused = true)]
async fn test_stop_cancels_pending_timer() {
    let (vault, _store, clock) = vault().await;
    let mut scheduler = BackupScheduler::new(
        Arc::clone(vault.engine()),
        Arc::new(clock),
        &vault.config().schedule,
    );
    scheduler.start().expect("start");
    assert_eq!(scheduler.state(), SchedulerState::Waiting);
    assert!(matches!(scheduler.start(), Err(SchedulerError::AlreadyRunning)));

    scheduler.shutdown().await.expect("shutdown");
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert!(scheduler.status().next_fire().is_none());

    tokio::time::sleep(DAY * 2).await;
    assert!(vault.engine().list_backups().await.expect("list").is_empty());
    assert!(matches!(scheduler.start(), Err(SchedulerError::Stopped)));
}

/// Test that a failed run is recorded and does not stop the schedule.
#[tokio::test(start_paused = true)]
async fn test_failed_run_keeps_schedule() {
    let (mut vault, store, clock) = vault().await;
    store.set(BACKUP_INDEX_KEY, "not json").await.expect("corrupt index");

    vault.start_scheduler().expect("start");
    let delay = first_delay(&vault, &clock);
    tokio::time::sleep(delay + StdDuration::from_secs(1)).await;

    let status = vault.scheduler().expect("scheduler").status();
    assert_eq!(status.runs(), 1);
    assert_eq!(status.failures(), 1);
    assert_eq!(status.state(), SchedulerState::Recurring);

    store.remove(BACKUP_INDEX_KEY).await.expect("repair index");
    tokio::time::sleep(DAY).await;

    let status = vault.scheduler().expect("scheduler").status();
    assert_eq!(status.runs(), 2);
    assert_eq!(status.failures(), 1);
    assert_eq!(vault.engine().list_backups().await.expect("list").len(), 1);

    vault.shutdown().await.expect("shutdown");
}

/// Test that dropping the scheduler cancels its task.
#[tokio::test(start_paused = true)]
async fn test_drop_cancels_task() {
    let (vault, _store, clock) = vault().await;
    let mut scheduler = BackupScheduler::new(
        Arc::clone(vault.engine()),
        Arc::new(clock),
        &vault.config().schedule,
    );
    scheduler.start().expect("start");
    let token = scheduler.cancellation_token();
    drop(scheduler);

    assert!(token.is_cancelled());
    tokio::time::sleep(DAY * 2).await;
    assert!(vault.engine().list_backups().await.expect("list").is_empty());
}
