// ============================================================================
// TV QUEUE - Durable Work Dispatch (spec C5)
// ============================================================================
// PURPOSE: a Redis-backed queue plus worker pool that turns `addTask` calls
// into completed `VerificationTask` rows and uploaded report artifacts.
//
// At-most-one-in-flight-per-app (spec §3) is enforced with an
// `{queue}:inflight:{app_id}` marker rather than by deriving a content hash
// from the request: the app id already is the natural dedup key, and the
// marker is cleared the moment the task reaches a terminal state.
// ============================================================================

pub mod config;
pub mod error;
pub mod queue;
pub mod request;
pub mod worker;

pub use config::QueueConfig;
pub use error::{QueueError, Result};
pub use queue::RedisQueue;
pub use request::{QueueStats, TaskRequest};
pub use worker::{VerifierAdapters, Worker};
