use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;
use tv_types::{AppInfo, EventLogEntry, KmsInfo, QuoteData, SystemInfo, TcbInfo, VmConfig};

#[derive(Debug, Error)]
pub enum AttestationClientError {
    #[error("app {0} not found")]
    NotFound(String),
    #[error("attestation endpoint unavailable: {0}")]
    Unavailable(String),
    #[error("app {0} reported no running instances with complete attestation data")]
    NoRunningInstances(String),
    #[error("response failed schema validation: {0}")]
    InvalidSchema(String),
}

#[async_trait]
pub trait AttestationClient: Send + Sync {
    async fn fetch_system_info(&self, app_id: &str) -> Result<SystemInfo, AttestationClientError>;

    /// Chooses `/prpc/Info` when `supports_info_rpc_endpoint` else
    /// `/prpc/Worker.Info`, converting the legacy shape (spec §4.1/§4.5).
    async fn fetch_app_info(
        &self,
        rpc_endpoint: &str,
        supports_info_rpc_endpoint: bool,
    ) -> Result<AppInfo, AttestationClientError>;
}

#[derive(Debug, Deserialize)]
struct RawSystemInfo {
    app_id: String,
    contract_address: Option<String>,
    kms_info: KmsInfo,
    instances: Vec<RawInstance>,
}

#[derive(Debug, Deserialize)]
struct RawInstance {
    quote: Option<String>,
    eventlog: Option<Vec<EventLogEntry>>,
    image_version: Option<String>,
}

/// Normalizes a quote hex string to `0x`-prefixed lowercase.
fn normalize_quote_hex(quote: &str) -> String {
    let stripped = quote.strip_prefix("0x").unwrap_or(quote);
    format!("0x{}", stripped.to_lowercase())
}

pub struct HttpAttestationClient {
    client: reqwest::Client,
    cloud_endpoint: String,
}

impl HttpAttestationClient {
    pub fn new(cloud_endpoint: impl Into<String>) -> Self {
        HttpAttestationClient {
            client: reqwest::Client::new(),
            cloud_endpoint: cloud_endpoint.into(),
        }
    }

    /// Converts instances into validated `QuoteData`, dropping any instance
    /// missing `quote`/`eventlog`/`image_version` (spec §4.1).
    fn convert_instances(raw: Vec<RawInstance>) -> Vec<QuoteData> {
        raw.into_iter()
            .filter_map(|inst| {
                let quote = inst.quote?;
                let eventlog = inst.eventlog?;
                let image_version = inst.image_version?;
                Some(QuoteData { quote: normalize_quote_hex(&quote), eventlog, image_version })
            })
            .collect()
    }

    /// Fills synthesized defaults for fields the legacy `/prpc/Worker.Info`
    /// response never returns (spec §4.5 "legacy conversion").
    fn convert_legacy_worker_info(raw: serde_json::Value) -> Result<AppInfo, AttestationClientError> {
        let get_str = |key: &str| -> String {
            raw.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_string()
        };

        let tcb_info = TcbInfo {
            mrtd: get_str("mrtd"),
            rtmr0: get_str("rtmr0"),
            rtmr1: get_str("rtmr1"),
            rtmr2: get_str("rtmr2"),
            rtmr3: get_str("rtmr3"),
            mr_aggregated: String::new(),
            os_image_hash: String::new(),
            compose_hash: get_str("compose_hash"),
            device_id: String::new(),
            app_compose: get_str("app_compose"),
            event_log: serde_json::from_value(raw.get("event_log").cloned().unwrap_or_default())
                .unwrap_or_default(),
        };

        // The legacy worker never reported GPU topology or memory layout;
        // these are the conservative defaults the modern tool would assume.
        let vm_config = VmConfig {
            cpu_count: raw.get("cpu_count").and_then(|v| v.as_u64()).unwrap_or(1) as u32,
            memory_size: raw.get("memory_size").and_then(|v| v.as_u64()).unwrap_or(0),
            num_gpus: 0,
            num_nvswitches: 0,
            hotplug_off: true,
            qemu_single_pass_add_pages: false,
            pic: false,
            pci_hole64_size: 0,
            hugepages: false,
        };

        Ok(AppInfo { tcb_info, vm_config })
    }
}

#[async_trait]
impl AttestationClient for HttpAttestationClient {
    async fn fetch_system_info(&self, app_id: &str) -> Result<SystemInfo, AttestationClientError> {
        let url = format!("{}/api/v1/apps/{}", self.cloud_endpoint, app_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AttestationClientError::Unavailable(e.to_string()))?;

        if response.status().as_u16() == 500 {
            return Err(AttestationClientError::NotFound(app_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(AttestationClientError::Unavailable(format!(
                "status {}",
                response.status()
            )));
        }

        let raw: RawSystemInfo = response
            .json()
            .await
            .map_err(|e| AttestationClientError::InvalidSchema(e.to_string()))?;

        let instances = Self::convert_instances(raw.instances);
        if instances.is_empty() {
            warn!(app_id, "all instances dropped for missing attestation fields");
            return Err(AttestationClientError::NoRunningInstances(app_id.to_string()));
        }

        Ok(SystemInfo {
            app_id: raw.app_id,
            contract_address: raw.contract_address,
            kms_info: raw.kms_info,
            instances,
        })
    }

    async fn fetch_app_info(
        &self,
        rpc_endpoint: &str,
        supports_info_rpc_endpoint: bool,
    ) -> Result<AppInfo, AttestationClientError> {
        let path = if supports_info_rpc_endpoint { "/prpc/Info" } else { "/prpc/Worker.Info" };
        let url = format!("{rpc_endpoint}{path}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AttestationClientError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AttestationClientError::Unavailable(format!(
                "status {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AttestationClientError::InvalidSchema(e.to_string()))?;

        if supports_info_rpc_endpoint {
            serde_json::from_value(body).map_err(|e| AttestationClientError::InvalidSchema(e.to_string()))
        } else {
            Self::convert_legacy_worker_info(body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_quote_hex_casing_and_prefix() {
        assert_eq!(normalize_quote_hex("0xABCDEF"), "0xabcdef");
        assert_eq!(normalize_quote_hex("ABCDEF"), "0xabcdef");
    }

    #[test]
    fn drops_instances_missing_required_fields() {
        let raw = vec![
            RawInstance { quote: Some("0xaa".into()), eventlog: Some(vec![]), image_version: Some("dstack-0.5.3".into()) },
            RawInstance { quote: None, eventlog: Some(vec![]), image_version: Some("dstack-0.5.3".into()) },
            RawInstance { quote: Some("0xaa".into()), eventlog: None, image_version: Some("dstack-0.5.3".into()) },
        ];
        let converted = HttpAttestationClient::convert_instances(raw);
        assert_eq!(converted.len(), 1);
    }

    #[test]
    fn legacy_worker_info_synthesizes_gpu_defaults() {
        let raw = serde_json::json!({
            "mrtd": "aa", "rtmr0": "bb", "rtmr1": "cc", "rtmr2": "dd", "rtmr3": "ee",
            "compose_hash": "ff", "app_compose": "{}",
        });
        let info = HttpAttestationClient::convert_legacy_worker_info(raw).unwrap();
        assert_eq!(info.vm_config.num_gpus, 0);
        assert!(info.vm_config.hotplug_off);
        assert_eq!(info.tcb_info.mrtd, "aa");
    }
}
