pub mod digest;
pub mod scheduler;

pub use digest::{run_digest, DigestContext};
pub use scheduler::{DailyScheduler, ScheduleError, ScheduledJob};
