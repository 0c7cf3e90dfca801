use crate::error::CronError;
use async_trait::async_trait;
use serde::Deserialize;
use tv_app_lifecycle::ProfileRecord;

/// Where `sync-profiles` pulls upstream display metadata from (spec §6
/// `METABASE_URL`/`METABASE_API_KEY`).
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn fetch_profiles(&self) -> Result<Vec<ProfileRecord>, CronError>;
}

#[derive(Debug, Deserialize)]
struct RawProfile {
    entity_type: String,
    entity_id: String,
    #[serde(flatten)]
    data: serde_json::Value,
}

pub struct HttpProfileSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpProfileSource {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        HttpProfileSource { client: reqwest::Client::new(), base_url: base_url.into(), api_key: api_key.into() }
    }
}

#[async_trait]
impl ProfileSource for HttpProfileSource {
    async fn fetch_profiles(&self) -> Result<Vec<ProfileRecord>, CronError> {
        let url = format!("{}/api/profiles", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| CronError::ProfileSource(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CronError::ProfileSource(format!("status {}", response.status())));
        }

        let raw: Vec<RawProfile> =
            response.json().await.map_err(|e| CronError::ProfileSource(e.to_string()))?;
        let synced_at = chrono::Utc::now();

        Ok(raw
            .into_iter()
            .map(|p| ProfileRecord { entity_type: p.entity_type, entity_id: p.entity_id, data: p.data, synced_at })
            .collect())
    }
}
