mod scheduler;
mod state_machine;

pub use scheduler::{PlaybackStatus, Scheduler, SchedulerError};
pub use state_machine::{PlaybackState, Status};
