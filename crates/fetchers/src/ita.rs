//! Intel Trust Authority appraisal client. The policy in spec §4.1 is the
//! load-bearing part of this file and must be preserved exactly:
//! SHA-256 cache key, in-flight dedup, a 2 req/s global rate limit, up to 4
//! retries honoring `Retry-After`, a 15s per-attempt timeout, and an LRU
//! (by expiry) cache capped at 500 entries.

use crate::rate_limiter::RateLimiter;
use crate::retry::backoff_delay;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};
use tracing::warn;

const MAX_ATTEMPTS: u32 = 4;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const BASE_DELAY: Duration = Duration::from_millis(250);
const MAX_DELAY: Duration = Duration::from_secs(3);
const JITTER: Duration = Duration::from_millis(120);
const SUCCESS_TTL_FLOOR: Duration = Duration::from_secs(600);
const SUCCESS_TTL_CEILING: Duration = Duration::from_secs(3600);
const FAILURE_TTL: Duration = Duration::from_secs(20);
const MAX_CACHE_ENTRIES: usize = 500;

pub type ItaAppraisal = Option<serde_json::Value>;

#[derive(Debug, Error, Clone)]
pub enum ItaError {
    #[error("ita appraisal request failed after {0} attempts: {1}")]
    Exhausted(u32, String),
}

#[async_trait]
pub trait ItaClient: Send + Sync {
    async fn appraise(&self, quote_hex: &str, api_key: &str) -> Result<ItaAppraisal, ItaError>;
}

#[derive(Clone)]
enum CachedOutcome {
    Success(ItaAppraisal),
    Failure(ItaError),
}

struct CacheEntry {
    outcome: CachedOutcome,
    expires_at: Instant,
}

pub struct ItaClientImpl {
    client: reqwest::Client,
    appraise_url: String,
    limiter: RateLimiter,
    cache: Mutex<HashMap<String, CacheEntry>>,
    inflight: Mutex<HashMap<String, Arc<OnceCell<CachedOutcome>>>>,
}

impl ItaClientImpl {
    pub fn new(appraise_url: impl Into<String>) -> Self {
        ItaClientImpl {
            client: reqwest::Client::new(),
            appraise_url: appraise_url.into(),
            limiter: RateLimiter::new("ita-global", 2, Duration::from_secs(1)),
            cache: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// SHA-256 of the normalized (strip `0x`, lowercase) quote hex.
    fn cache_key(quote_hex: &str) -> String {
        let normalized = quote_hex.trim_start_matches("0x").to_lowercase();
        let digest = Sha256::digest(normalized.as_bytes());
        hex::encode(digest)
    }

    async fn cached(&self, key: &str) -> Option<CachedOutcome> {
        let cache = self.cache.lock().await;
        cache.get(key).filter(|entry| entry.expires_at > Instant::now()).map(|e| e.outcome.clone())
    }

    async fn store(&self, key: String, outcome: CachedOutcome, ttl: Duration) {
        let mut cache = self.cache.lock().await;
        if cache.len() >= MAX_CACHE_ENTRIES && !cache.contains_key(&key) {
            if let Some(oldest_key) = cache
                .iter()
                .min_by_key(|(_, entry)| entry.expires_at)
                .map(|(k, _)| k.clone())
            {
                cache.remove(&oldest_key);
            }
        }
        cache.insert(key, CacheEntry { outcome, expires_at: Instant::now() + ttl });
    }

    async fn do_request(&self, quote_hex: &str, api_key: &str) -> CachedOutcome {
        let mut last_error = String::new();

        for attempt in 0..MAX_ATTEMPTS {
            self.limiter.acquire().await;

            let result = tokio::time::timeout(
                REQUEST_TIMEOUT,
                self.client
                    .post(&self.appraise_url)
                    .bearer_auth(api_key)
                    .json(&serde_json::json!({ "quote": quote_hex }))
                    .send(),
            )
            .await;

            let response = match result {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    last_error = e.to_string();
                    self.sleep_backoff(attempt, None).await;
                    continue;
                }
                Err(_) => {
                    last_error = "request timed out after 15s".to_string();
                    self.sleep_backoff(attempt, None).await;
                    continue;
                }
            };

            let status = response.status().as_u16();
            if status == 429 || (500..600).contains(&status) {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs);
                last_error = format!("status {status}");
                self.sleep_backoff(attempt, retry_after).await;
                continue;
            }
            if !response.status().is_success() {
                return CachedOutcome::Failure(ItaError::Exhausted(
                    attempt + 1,
                    format!("status {status}"),
                ));
            }

            let token = match response.text().await {
                Ok(t) => t,
                Err(e) => {
                    last_error = e.to_string();
                    self.sleep_backoff(attempt, None).await;
                    continue;
                }
            };

            return CachedOutcome::Success(decode_jwt_payload(&token));
        }

        warn!(quote = %quote_hex, error = %last_error, "ita appraisal exhausted retries");
        CachedOutcome::Failure(ItaError::Exhausted(MAX_ATTEMPTS, last_error))
    }

    async fn sleep_backoff(&self, attempt: u32, retry_after: Option<Duration>) {
        let delay = retry_after.unwrap_or_else(|| backoff_delay(attempt, BASE_DELAY, MAX_DELAY, JITTER));
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl ItaClient for ItaClientImpl {
    async fn appraise(&self, quote_hex: &str, api_key: &str) -> Result<ItaAppraisal, ItaError> {
        let key = Self::cache_key(quote_hex);

        if let Some(outcome) = self.cached(&key).await {
            return outcome_to_result(outcome);
        }

        let cell = {
            let mut inflight = self.inflight.lock().await;
            inflight.entry(key.clone()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };

        let outcome = cell
            .get_or_init(|| async { self.do_request(quote_hex, api_key).await })
            .await
            .clone();

        {
            let mut inflight = self.inflight.lock().await;
            inflight.remove(&key);
        }

        let ttl = match &outcome {
            CachedOutcome::Success(appraisal) => success_ttl(appraisal),
            CachedOutcome::Failure(_) => FAILURE_TTL,
        };
        self.store(key, outcome.clone(), ttl).await;

        outcome_to_result(outcome)
    }
}

fn outcome_to_result(outcome: CachedOutcome) -> Result<ItaAppraisal, ItaError> {
    match outcome {
        CachedOutcome::Success(appraisal) => Ok(appraisal),
        CachedOutcome::Failure(err) => Err(err),
    }
}

/// `remaining` is derived from the JWT's `exp` claim; the stored TTL is
/// `remaining` capped at 60 minutes (see spec §4.1 "TTL").
fn success_ttl(appraisal: &ItaAppraisal) -> Duration {
    let Some(value) = appraisal else { return SUCCESS_TTL_FLOOR };
    let Some(exp) = value.get("exp").and_then(|v| v.as_i64()) else { return SUCCESS_TTL_FLOOR };
    let now = chrono::Utc::now().timestamp();
    let remaining_secs = (exp - now).max(0) as u64;
    Duration::from_secs(remaining_secs).min(SUCCESS_TTL_CEILING)
}

/// Decodes the base64url middle segment of a JWT into JSON. Token absence
/// (blank/empty body) yields `None`, never an error (spec §4.1).
fn decode_jwt_payload(token: &str) -> ItaAppraisal {
    let trimmed = token.trim().trim_matches('"');
    if trimmed.is_empty() {
        return None;
    }
    let middle = trimmed.split('.').nth(1)?;
    let decoded = base64::Engine::decode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, middle).ok()?;
    serde_json::from_slice(&decoded).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_normalized() {
        assert_eq!(ItaClientImpl::cache_key("0xABCDEF"), ItaClientImpl::cache_key("abcdef"));
    }

    #[test]
    fn decode_jwt_payload_returns_none_for_blank_token() {
        assert_eq!(decode_jwt_payload(""), None);
        assert_eq!(decode_jwt_payload("  "), None);
    }

    #[test]
    fn decode_jwt_payload_parses_middle_segment() {
        let payload = serde_json::json!({"exp": 99999999999i64, "ok": true});
        let encoded = base64::Engine::encode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            serde_json::to_vec(&payload).unwrap(),
        );
        let token = format!("header.{encoded}.sig");
        let decoded = decode_jwt_payload(&token).unwrap();
        assert_eq!(decoded["ok"], serde_json::json!(true));
    }

    #[test]
    fn success_ttl_is_capped_at_60_minutes() {
        let far_future = chrono::Utc::now().timestamp() + 10_000;
        let appraisal = Some(serde_json::json!({"exp": far_future}));
        assert_eq!(success_ttl(&appraisal), SUCCESS_TTL_CEILING);
    }

    #[tokio::test]
    async fn appraise_rejects_when_request_fails_without_a_server() {
        let client = ItaClientImpl::new("http://127.0.0.1:1");
        let result = client.appraise("0xaa", "key").await;
        assert!(result.is_err());
    }
}
