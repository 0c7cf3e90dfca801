use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppLifecycleError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("governance payload malformed: {0}")]
    Governance(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AppLifecycleError>;
