use thiserror::Error;

#[derive(Debug, Error)]
pub enum CronError {
    #[error("scheduler backend error: {0}")]
    Backend(#[from] tokio_cron_scheduler::JobSchedulerError),
    #[error("unknown schedule: {0}")]
    UnknownSchedule(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("app lifecycle error: {0}")]
    AppLifecycle(#[from] tv_app_lifecycle::AppLifecycleError),
    #[error("storage error: {0}")]
    Storage(#[from] tv_storage::StorageError),
    #[error("queue error: {0}")]
    Queue(#[from] tv_queue::QueueError),
    #[error("profile source error: {0}")]
    ProfileSource(String),
}

pub type Result<T> = std::result::Result<T, CronError>;
