//! Scheduler state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of the daily backup job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    #[default]
    Idle,
    /// Single-shot delay until the first fire.
    Waiting,
    /// Firing every 24 hours.
    Recurring,
    Stopped,
}

/// Observable scheduler status shared with the background task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleStatus {
    state: SchedulerState,
    next_fire: Option<DateTime<Utc>>,
    runs: u64,
    failures: u64,
}

impl ScheduleStatus {
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// When the job fires next, while the scheduler is active.
    #[must_use]
    pub fn next_fire(&self) -> Option<DateTime<Utc>> {
        self.next_fire
    }

    /// Completed job runs, successful or not.
    #[must_use]
    pub fn runs(&self) -> u64 {
        self.runs
    }

    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub(crate) fn transition(&mut self, new_state: SchedulerState) {
        tracing::debug!(from = ?self.state, to = ?new_state, "Scheduler state transition");
        self.state = new_state;
        if new_state == SchedulerState::Stopped {
            self.next_fire = None;
        }
    }

    pub(crate) fn set_next_fire(&mut self, at: DateTime<Utc>) {
        self.next_fire = Some(at);
    }

    pub(crate) fn record_run(&mut self, success: bool) {
        self.runs = self.runs.saturating_add(1);
        if !success {
            self.failures = self.failures.saturating_add(1);
        }
    }
}
