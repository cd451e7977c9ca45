//! Daily automatic backups.

mod daily;
mod error;
mod state;

pub use daily::{next_fire_after, BackupScheduler, SCHEDULED_DESCRIPTION};
pub use error::SchedulerError;
pub use state::{ScheduleStatus, SchedulerState};
