//! CAA record lookup for `verifyDnsCAA`. Implemented over DNS-over-HTTPS via
//! the same `reqwest` client the rest of this workspace already uses for
//! attestation HTTP, rather than pulling in a dedicated resolver crate.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DnsCaaError {
    #[error("doh request failed: {0}")]
    Request(String),
}

#[async_trait]
pub trait DnsCaaResolver: Send + Sync {
    /// Returns the `issue` tag values of any CAA records for `domain`.
    async fn caa_issuers(&self, domain: &str) -> Result<Vec<String>, DnsCaaError>;
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    data: String,
}

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(default)]
    #[serde(rename = "Answer")]
    answer: Vec<DohAnswer>,
}

pub struct HttpDohCaaResolver {
    client: reqwest::Client,
    doh_base: String,
}

impl HttpDohCaaResolver {
    pub fn new(doh_base: impl Into<String>) -> Self {
        HttpDohCaaResolver { client: reqwest::Client::new(), doh_base: doh_base.into() }
    }
}

impl Default for HttpDohCaaResolver {
    fn default() -> Self {
        Self::new("https://cloudflare-dns.com/dns-query")
    }
}

#[async_trait]
impl DnsCaaResolver for HttpDohCaaResolver {
    async fn caa_issuers(&self, domain: &str) -> Result<Vec<String>, DnsCaaError> {
        let response = self
            .client
            .get(&self.doh_base)
            .query(&[("name", domain), ("type", "CAA")])
            .header("accept", "application/dns-json")
            .send()
            .await
            .map_err(|e| DnsCaaError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(DnsCaaError::Request(format!("status {}", response.status())));
        }
        let parsed: DohResponse = response.json().await.map_err(|e| DnsCaaError::Request(e.to_string()))?;
        Ok(parsed.answer.into_iter().filter_map(|a| parse_issue_tag(&a.data)).collect())
    }
}

/// CAA record data is `<flags> issue "<issuer>"`; extracts `<issuer>`.
fn parse_issue_tag(data: &str) -> Option<String> {
    let quoted = data.split('"').nth(1)?;
    Some(quoted.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_issuer_out_of_caa_record_data() {
        assert_eq!(parse_issue_tag(r#"0 issue "letsencrypt.org""#), Some("letsencrypt.org".to_string()));
    }

    #[test]
    fn returns_none_for_malformed_data() {
        assert_eq!(parse_issue_tag("0 issue"), None);
    }
}
