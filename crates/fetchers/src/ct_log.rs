use crate::rate_limiter::RateLimiter;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CtLogError {
    #[error("ct aggregator request failed: {0}")]
    Request(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CtLogCertEntry {
    pub issuer: String,
    pub not_before: String,
    pub not_after: String,
    pub serial: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CtLogQueryResult {
    pub domain: String,
    pub entries: Vec<CtLogCertEntry>,
}

/// Queries a CT aggregator for `domain`, globally rate-limited to at most 2
/// requests/second (spec §4.1).
#[async_trait]
pub trait CtLogClient: Send + Sync {
    async fn query(&self, domain: &str) -> Result<CtLogQueryResult, CtLogError>;
}

pub struct HttpCtLogClient {
    client: reqwest::Client,
    aggregator_base: String,
    limiter: RateLimiter,
}

impl HttpCtLogClient {
    pub fn new(aggregator_base: impl Into<String>) -> Self {
        HttpCtLogClient {
            client: reqwest::Client::new(),
            aggregator_base: aggregator_base.into(),
            limiter: RateLimiter::new("ct-log-global", 2, Duration::from_secs(1)),
        }
    }

    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }
}

#[async_trait]
impl CtLogClient for HttpCtLogClient {
    async fn query(&self, domain: &str) -> Result<CtLogQueryResult, CtLogError> {
        self.limiter.acquire().await;

        let url = format!("{}/ct/v1/query?domain={}", self.aggregator_base, domain);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CtLogError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(CtLogError::Request(format!("status {}", response.status())));
        }
        let entries: Vec<CtLogCertEntry> =
            response.json().await.map_err(|e| CtLogError::Request(e.to_string()))?;
        Ok(CtLogQueryResult { domain: domain.to_string(), entries })
    }
}
