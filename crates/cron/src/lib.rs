// ============================================================================
// TV CRON - Scheduled Sync & Cleanup (spec C7)
// ============================================================================
// PURPOSE: three named schedules (cleanup-failed-tasks, sync-profiles,
// sync-tasks) plus a manual forceRefreshAllApps trigger, with an admin
// plane (start/stop/trigger by name, bulk variants, status) that the
// binary's HTTP surface gates behind a bearer token.
// ============================================================================

pub mod error;
pub mod profile_source;
pub mod schedule;
pub mod scheduler;

pub use error::{CronError, Result};
pub use profile_source::{HttpProfileSource, ProfileSource};
pub use schedule::{CronPatterns, ScheduleName};
pub use scheduler::{check_bearer_token, CronScheduler, CronStatus};
