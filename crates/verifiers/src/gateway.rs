use crate::chain::ChainVerifier;
use crate::component::ComponentVerifier;
use crate::dns::DnsCaaResolver;
use crate::result::{StepFailure, StepOutcome, VerifyResult};
use async_trait::async_trait;
use std::sync::Arc;
use tv_collector::DataObjectCollector;
use tv_fetchers::GatewayClient;
use tv_types::DataObject;

/// Wraps the shared hardware/OS/source-code checks (delegated to an inner
/// `ComponentVerifier` with `role = "gateway"`) and adds the four
/// domain-control steps that only the Gateway exposes (spec §4.3.a).
pub struct GatewayVerifier {
    inner: ComponentVerifier,
    gateway_rpc_base: String,
    domain: String,
    expected_cert_pubkey: Option<String>,
    gateway_client: Arc<dyn GatewayClient>,
    ct_log_client: Arc<dyn tv_fetchers::CtLogClient>,
    dns_resolver: Arc<dyn DnsCaaResolver>,
    approved_ca_issuers: Vec<String>,
}

impl GatewayVerifier {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        inner: ComponentVerifier,
        gateway_rpc_base: impl Into<String>,
        domain: impl Into<String>,
        expected_cert_pubkey: Option<String>,
        gateway_client: Arc<dyn GatewayClient>,
        ct_log_client: Arc<dyn tv_fetchers::CtLogClient>,
        dns_resolver: Arc<dyn DnsCaaResolver>,
        approved_ca_issuers: Vec<String>,
    ) -> Self {
        GatewayVerifier {
            inner,
            gateway_rpc_base: gateway_rpc_base.into(),
            domain: domain.into(),
            expected_cert_pubkey,
            gateway_client,
            ct_log_client,
            dns_resolver,
            approved_ca_issuers,
        }
    }

    fn main_id(&self) -> String {
        "gateway-main".to_string()
    }
}

#[async_trait]
impl ChainVerifier for GatewayVerifier {
    fn role(&self) -> &'static str {
        "gateway"
    }

    async fn verify_hardware(&mut self, collector: &mut DataObjectCollector) -> StepOutcome {
        self.inner.verify_hardware(collector).await
    }

    async fn verify_operating_system(&mut self, collector: &mut DataObjectCollector) -> StepOutcome {
        self.inner.verify_operating_system(collector).await
    }

    async fn verify_source_code(&mut self, collector: &mut DataObjectCollector) -> StepOutcome {
        self.inner.verify_source_code(collector).await
    }

    /// The ACME account backing the gateway's certificates must have been
    /// generated and held inside the TEE.
    async fn verify_tee_controlled_key(&mut self, collector: &mut DataObjectCollector) -> Option<StepOutcome> {
        Some(async {
            let acme_info = self
                .gateway_client
                .fetch_acme_info(&self.gateway_rpc_base)
                .await
                .map_err(|e| format!("acme info fetch failed: {e}"))?;

            let tee_controlled = acme_info.get("tee_controlled").and_then(|v| v.as_bool()).unwrap_or(false);
            if tee_controlled {
                Ok(VerifyResult::ok())
            } else {
                Ok(VerifyResult::failed(vec![StepFailure::new(
                    self.main_id(),
                    "Gateway ACME account key is not reported as TEE-controlled",
                )]))
            }
        }
        .await)
    }

    /// The certificate's public key, as reported by the gateway, must match
    /// the `cert_pubkey` KMS wired onto this object (spec §6 relationship
    /// table).
    async fn verify_certificate_key(&mut self, _collector: &mut DataObjectCollector) -> Option<StepOutcome> {
        let Some(expected) = &self.expected_cert_pubkey else { return Some(Ok(VerifyResult::ok())) };

        Some(async {
            let acme_info = self
                .gateway_client
                .fetch_acme_info(&self.gateway_rpc_base)
                .await
                .map_err(|e| format!("acme info fetch failed: {e}"))?;
            let reported = acme_info.get("cert_pubkey").and_then(|v| v.as_str()).unwrap_or_default();
            if reported == expected {
                Ok(VerifyResult::ok())
            } else {
                Ok(VerifyResult::failed(vec![StepFailure::new(self.main_id(), "Certificate public key does not match KMS-issued key")]))
            }
        }
        .await)
    }

    async fn verify_dns_caa(&mut self, _collector: &mut DataObjectCollector) -> Option<StepOutcome> {
        Some(async {
            let issuers = self.dns_resolver.caa_issuers(&self.domain).await.map_err(|e| format!("dns caa lookup failed: {e}"))?;
            if issuers.is_empty() || issuers.iter().any(|i| self.approved_ca_issuers.contains(i)) {
                Ok(VerifyResult::ok())
            } else {
                Ok(VerifyResult::failed(vec![StepFailure::new(
                    self.main_id(),
                    format!("CAA record does not authorize an approved issuer: {issuers:?}"),
                )]))
            }
        }
        .await)
    }

    async fn verify_ct_log(&mut self, collector: &mut DataObjectCollector) -> Option<StepOutcome> {
        Some(async {
            let result = self.ct_log_client.query(&self.domain).await.map_err(|e| format!("ct log query failed: {e}"))?;

            let object = DataObject::new("gateway-ct-log", "gateway ct log", "Certificate Transparency query summary")
                .expect("valid id")
                .with_field("domain", result.domain.clone())
                .with_field("entry_count", result.entries.len() as u64);
            collector.create_or_update(object);

            Ok(VerifyResult::ok())
        }
        .await)
    }
}
