use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayClientError {
    #[error("gateway request failed: {0}")]
    Request(String),
    #[error("gateway response failed schema validation: {0}")]
    InvalidSchema(String),
}

/// Simple GETs to the gateway rpc base (spec §4.1).
#[async_trait]
pub trait GatewayClient: Send + Sync {
    async fn fetch_acme_info(&self, gateway_rpc_base: &str) -> Result<Value, GatewayClientError>;
    async fn fetch_app_info(&self, gateway_rpc_base: &str) -> Result<Value, GatewayClientError>;
}

pub struct HttpGatewayClient {
    client: reqwest::Client,
}

impl HttpGatewayClient {
    pub fn new() -> Self {
        HttpGatewayClient { client: reqwest::Client::new() }
    }

    async fn get_json(&self, url: &str) -> Result<Value, GatewayClientError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GatewayClientError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(GatewayClientError::Request(format!("status {}", response.status())));
        }
        response.json().await.map_err(|e| GatewayClientError::InvalidSchema(e.to_string()))
    }
}

impl Default for HttpGatewayClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
    async fn fetch_acme_info(&self, gateway_rpc_base: &str) -> Result<Value, GatewayClientError> {
        self.get_json(&format!("{gateway_rpc_base}/acme-info")).await
    }

    async fn fetch_app_info(&self, gateway_rpc_base: &str) -> Result<Value, GatewayClientError> {
        self.get_json(&format!("{gateway_rpc_base}/app-info")).await
    }
}
