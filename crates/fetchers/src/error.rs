use thiserror::Error;

/// Shared failure taxonomy for fact fetchers. Individual adapters narrow
/// this down further where spec.md names a specific variant (e.g.
/// `AttestationClientError::NotFound`).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("response failed schema validation: {0}")]
    InvalidSchema(String),

    #[error("rate limiter unavailable, proceeding fail-open: {0}")]
    RateLimiterUnavailable(String),

    #[error("tool invocation failed: {0}")]
    ToolExec(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
