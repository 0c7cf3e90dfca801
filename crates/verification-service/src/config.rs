use serde::{Deserialize, Serialize};

/// The per-call input to `VerificationService::verify` (spec §4.4
/// `verify(appConfig, flags)`). Distilled from `App` plus the handful of
/// endpoint identifiers the three chain roles need to fetch their own
/// facts; the scheduler (C6) is responsible for keeping these current.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppVerificationConfig {
    pub app_id: String,
    pub base_image: String,
    pub rpc_endpoint: String,
    pub domain: String,
    /// The KMS deployment's own upstream app id, used to fetch its
    /// `SystemInfo` the same way the target app's is fetched. The data
    /// model does not carry this on `KmsInfo` directly (which only
    /// exposes `url`/`gateway_app_id`), so it is operator-configured
    /// per KMS deployment.
    pub kms_app_id: String,
    pub kms_rpc_endpoint: String,
    pub kms_contract_address: Option<String>,
    pub kms_chain_id: Option<u64>,
    pub approved_ca_issuers: Vec<String>,
}
