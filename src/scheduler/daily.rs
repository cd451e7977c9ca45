//! Background task that takes an incremental backup once a day.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::error::SchedulerError;
use super::state::{ScheduleStatus, SchedulerState};
use crate::backup::{BackupEngine, BackupType};
use crate::clock::Clock;
use crate::config::ScheduleConfig;

/// Description attached to scheduled snapshots.
pub const SCHEDULED_DESCRIPTION: &str = "Automatic daily backup";

const DAY: StdDuration = StdDuration::from_secs(24 * 60 * 60);

/// First instant strictly after `now` whose wall-clock time in `now`'s zone is `hour:minute`.
///
/// Out-of-range values are clamped. A time skipped by a DST gap moves to the next day.
#[must_use]
pub fn next_fire_after<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32, minute: u32) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut day = now.date_naive();
    loop {
        let candidate = day
            .and_hms_opt(hour.min(23), minute.min(59), 0)
            .and_then(|naive| tz.from_local_datetime(&naive).earliest());
        if let Some(candidate) = candidate {
            if candidate > *now {
                return candidate;
            }
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => return now.clone() + Duration::days(1),
        }
    }
}

/// Fires [`BackupEngine::create_backup`] every day at the configured local time.
///
/// The job runs on its own tokio task and shares the engine, so it takes the
/// same index lock as manual backups.
pub struct BackupScheduler {
    engine: Arc<BackupEngine>,
    clock: Arc<dyn Clock>,
    hour: u32,
    minute: u32,
    cancel: CancellationToken,
    status: Arc<Mutex<ScheduleStatus>>,
    handle: Option<JoinHandle<()>>,
}

impl BackupScheduler {
    #[must_use]
    pub fn new(engine: Arc<BackupEngine>, clock: Arc<dyn Clock>, config: &ScheduleConfig) -> Self {
        Self {
            engine,
            clock,
            hour: config.hour,
            minute: config.minute,
            cancel: CancellationToken::new(),
            status: Arc::new(Mutex::new(ScheduleStatus::default())),
            handle: None,
        }
    }

    /// Snapshot of the current status.
    #[must_use]
    pub fn status(&self) -> ScheduleStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.status().state()
    }

    /// Token that stops the scheduler when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn the background task.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyRunning`] on a second call and
    /// [`SchedulerError::Stopped`] after the scheduler was stopped.
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        if self.cancel.is_cancelled() {
            return Err(SchedulerError::Stopped);
        }
        if self.handle.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }

        let now = self.clock.now().with_timezone(&Local);
        let next = next_fire_after(&now, self.hour, self.minute);
        let delay = next.signed_duration_since(now).to_std().unwrap_or_default();
        {
            let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
            status.set_next_fire(next.with_timezone(&Utc));
            status.transition(SchedulerState::Waiting);
        }
        tracing::info!(next_fire = %next, delay_secs = delay.as_secs(), "Backup scheduler started");

        let task = ScheduledJob {
            engine: Arc::clone(&self.engine),
            clock: Arc::clone(&self.clock),
            status: Arc::clone(&self.status),
            cancel: self.cancel.clone(),
        };
        self.handle = Some(tokio::spawn(task.run(delay)));
        Ok(())
    }

    /// Cancel the pending timer. A job already running finishes first.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!("Stopping backup scheduler");
        }
        self.cancel.cancel();
        if self.handle.is_none() {
            self.status
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .transition(SchedulerState::Stopped);
        }
    }

    /// Stop and wait for the background task to exit.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Join`] if the task panicked.
    pub async fn shutdown(&mut self) -> Result<(), SchedulerError> {
        self.stop();
        if let Some(handle) = self.handle.take() {
            handle.await?;
        }
        Ok(())
    }
}

impl Drop for BackupScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for BackupScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupScheduler")
            .field("hour", &self.hour)
            .field("minute", &self.minute)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

struct ScheduledJob {
    engine: Arc<BackupEngine>,
    clock: Arc<dyn Clock>,
    status: Arc<Mutex<ScheduleStatus>>,
    cancel: CancellationToken,
}

impl ScheduledJob {
    async fn run(self, delay: StdDuration) {
        tokio::select! {
            biased;

            () = self.cancel.cancelled() => {
                self.transition(SchedulerState::Stopped);
                tracing::info!("Backup scheduler cancelled before first run");
                return;
            }
            () = tokio::time::sleep(delay) => {}
        }

        self.fire().await;
        self.transition(SchedulerState::Recurring);

        let mut ticks = interval_at(Instant::now() + DAY, DAY);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            self.set_next_fire(self.clock.now() + Duration::days(1));
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => break,
                _ = ticks.tick() => self.fire().await,
            }
        }

        self.transition(SchedulerState::Stopped);
        tracing::info!("Backup scheduler stopped");
    }

    async fn fire(&self) {
        let result = self
            .engine
            .create_backup(BackupType::Incremental, SCHEDULED_DESCRIPTION)
            .await;
        let success = match result {
            Ok(snapshot) => {
                tracing::info!(backup_id = %snapshot.id, "Scheduled backup completed");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Scheduled backup failed");
                false
            }
        };
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record_run(success);
    }

    fn transition(&self, state: SchedulerState) {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .transition(state);
    }

    fn set_next_fire(&self, at: DateTime<Utc>) {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_next_fire(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Timelike};

    fn utc(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 20, h, m, s).unwrap()
    }

    #[test]
    fn test_next_fire_later_today() {
        let now = utc(1, 30, 0);
        assert_eq!(next_fire_after(&now, 2, 0), utc(2, 0, 0));
    }

    #[test]
    fn test_next_fire_tomorrow_when_past() {
        let now = utc(2, 0, 1);
        let next = next_fire_after(&now, 2, 0);
        assert_eq!(next, utc(2, 0, 0) + Duration::days(1));
    }

    #[test]
    fn test_next_fire_exactly_now_is_tomorrow() {
        let now = utc(2, 0, 0);
        assert_eq!(next_fire_after(&now, 2, 0), now + Duration::days(1));
    }

    #[test]
    fn test_next_fire_respects_offset() {
        let tz = FixedOffset::east_opt(5 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2026, 5, 20, 23, 0, 0).unwrap();
        let next = next_fire_after(&now, 2, 30);

        assert_eq!(next.hour(), 2);
        assert_eq!(next.minute(), 30);
        assert_eq!(next.signed_duration_since(now), Duration::hours(3) + Duration::minutes(30));
    }

    #[test]
    fn test_next_fire_clamps_out_of_range() {
        let now = utc(0, 0, 0);
        assert_eq!(next_fire_after(&now, 99, 99), utc(23, 59, 0));
    }
}
