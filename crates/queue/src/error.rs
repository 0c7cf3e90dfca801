use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("backend error: {0}")]
    Backend(#[from] redis::RedisError),
    #[error("app {0} does not exist")]
    AppNotFound(String),
    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QueueError>;
