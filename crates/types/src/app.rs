use crate::version::VersionPolicy;
use serde::{Deserialize, Serialize};

/// `agentic` apps run a single model behind an agent runtime; `cloud` apps
/// are general confidential-compute workloads. Purely descriptive — it does
/// not change verification behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppConfigType {
    Agentic,
    Cloud,
}

/// Where governance for this app's KMS contract lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GovernanceKind {
    /// No on-chain governance; the KMS is hosted directly by an operator.
    HostedBy { operator: String },
    /// Governed by an on-chain contract on a named chain.
    OnChain { chain_name: String, explorer_url: String, chain_id: u64 },
}

impl GovernanceKind {
    /// Literal inputs from spec §8: `chain_id=8453` -> Base,
    /// `chain_id=null` -> `{HostedBy, "Phala"}`, `chain_id=1` -> Ethereum.
    pub fn from_chain_id(chain_id: Option<u64>) -> Self {
        match chain_id {
            None => GovernanceKind::HostedBy { operator: "Phala".to_string() },
            Some(8453) => GovernanceKind::OnChain {
                chain_name: "Base".to_string(),
                explorer_url: "https://basescan.org".to_string(),
                chain_id: 8453,
            },
            Some(1) => GovernanceKind::OnChain {
                chain_name: "Ethereum".to_string(),
                explorer_url: "https://etherscan.io".to_string(),
                chain_id: 1,
            },
            Some(other) => GovernanceKind::OnChain {
                chain_name: format!("chain-{other}"),
                explorer_url: String::new(),
                chain_id: other,
            },
        }
    }
}

/// An application registration mirrored from the upstream inventory
/// (spec §3 "App").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct App {
    /// Stable hex app id; primary key.
    pub app_id: String,
    pub contract_address: Option<String>,
    pub display_name: String,
    pub config_type: AppConfigType,
    pub base_image: String,
    pub target_domain_or_model: Option<String>,
    pub kms_contract_address: Option<String>,
    pub kms_chain_id: Option<u64>,
    pub gateway_domain_suffix: String,
    pub tproxy_base_domain: String,
    pub governance: GovernanceKind,
    pub deleted: bool,
    pub last_synced_at: chrono::DateTime<chrono::Utc>,
}

impl App {
    /// Parses this app's policy object from its stored `base_image`.
    pub fn version_policy(&self) -> Result<VersionPolicy, crate::error::TypesError> {
        VersionPolicy::from_base_image(&self.base_image)
    }

    /// Recomputes `contract_address` / `model_or_domain` per the
    /// version-routing rule (spec §4.6) and overwrites the cached fields.
    pub fn recompute_routing(&mut self) -> Result<(), crate::error::TypesError> {
        let policy = self.version_policy()?;
        let routed = policy.route(
            &self.app_id,
            self.contract_address.as_deref(),
            &self.gateway_domain_suffix,
            &self.tproxy_base_domain,
        );
        self.contract_address = routed.contract_address;
        self.target_domain_or_model = Some(routed.model_or_domain);
        Ok(())
    }

    /// `getValidApps` predicate (spec §4.6): non-empty contract address,
    /// non-empty model/domain, not soft-deleted.
    pub fn is_valid(&self) -> bool {
        !self.deleted
            && self.contract_address.as_deref().is_some_and(|s| !s.is_empty())
            && self.target_domain_or_model.as_deref().is_some_and(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_app() -> App {
        App {
            app_id: "deadbeef".into(),
            contract_address: None,
            display_name: "test-app".into(),
            config_type: AppConfigType::Cloud,
            base_image: "dstack-0.5.3".into(),
            target_domain_or_model: None,
            kms_contract_address: None,
            kms_chain_id: Some(8453),
            gateway_domain_suffix: "gw.example.com".into(),
            tproxy_base_domain: "tproxy.example.com".into(),
            governance: GovernanceKind::from_chain_id(Some(8453)),
            deleted: false,
            last_synced_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn recompute_routing_fills_modern_fields() {
        let mut app = base_app();
        app.recompute_routing().unwrap();
        assert_eq!(app.contract_address.as_deref(), Some("0xdeadbeef"));
        assert_eq!(app.target_domain_or_model.as_deref(), Some("gw.example.com"));
        assert!(app.is_valid());
    }

    #[test]
    fn legacy_app_is_invalid_until_domain_present() {
        let mut app = base_app();
        app.base_image = "dstack-0.3.6".into();
        app.recompute_routing().unwrap();
        assert_eq!(app.contract_address, None);
        assert!(!app.is_valid());
    }

    #[test]
    fn governance_literal_inputs() {
        assert!(matches!(
            GovernanceKind::from_chain_id(None),
            GovernanceKind::HostedBy { ref operator } if operator == "Phala"
        ));
        assert!(matches!(
            GovernanceKind::from_chain_id(Some(8453)),
            GovernanceKind::OnChain { chain_id: 8453, .. }
        ));
        assert!(matches!(
            GovernanceKind::from_chain_id(Some(1)),
            GovernanceKind::OnChain { chain_id: 1, .. }
        ));
    }
}
