//! Storage retention: photo payloads on old attendance rows are nulled
//! out to cap table growth. The policy computes advisory stats and runs
//! the purge; the scheduler drives it on a timer with a no-overlap guard.

pub mod policy;
pub mod scheduler;

pub use policy::{PurgeOutcome, RetentionPolicy, RetentionStats, default_cutoff, test_cutoff};
pub use scheduler::{CleanupOutcome, CleanupScheduler, SchedulerStatus, StartOutcome};
