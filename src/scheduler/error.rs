//! Scheduler errors.

use thiserror::Error;

/// Errors from starting or stopping the backup scheduler.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Scheduler is already running")]
    AlreadyRunning,

    #[error("Scheduler was stopped and cannot be restarted")]
    Stopped,

    #[error("Scheduler task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
