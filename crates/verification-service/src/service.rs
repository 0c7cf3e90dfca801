use crate::config::AppVerificationConfig;
use crate::error_mapping::map_error_message;
use crate::git_commit::GitCommitResolver;
use crate::response::VerificationReport;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use tv_collector::{mask, DataObjectCollector};
use tv_fetchers::{AttestationClient, CtLogClient, GatewayClient, ImageRepository, OnChainRegistry, ToolExec};
use tv_types::{EventLogEntry, TcbInfo, VersionPolicy, VmConfig};
use tv_verifiers::{
    ChainOutcome, ChainVerifier, ComponentVerifier, DnsCaaResolver, GatewayVerifier, LegacyGatewayStub, LegacyKmsStub,
    OnchainCoordinates, VerificationFlags, VerificationFlagsPatch,
};

/// The facts one chain role (kms/gateway/app) needs to build its
/// `ComponentVerifier`: a quote plus its event log (from `SystemInfo`) and
/// the TCB/VM shape reported by the role's own RPC endpoint.
struct RoleBundle {
    quote_hex: String,
    event_log: Vec<EventLogEntry>,
    image_version: String,
    tcb_info: TcbInfo,
    vm_config: VmConfig,
}

/// Per-request lifecycle orchestrator (spec §4.4, C4): owns one
/// `DataObjectCollector`, fetches facts through C1, drives a C3 chain, and
/// assembles the final report. Callers that want the "fresh service per
/// task" isolation the worker pool requires (spec §4.5) should construct a
/// new instance per task rather than reuse one across verifications.
pub struct VerificationService {
    attestation_client: Arc<dyn AttestationClient>,
    gateway_client: Arc<dyn GatewayClient>,
    onchain_registry: Arc<dyn OnChainRegistry>,
    ct_log_client: Arc<dyn CtLogClient>,
    dns_resolver: Arc<dyn DnsCaaResolver>,
    tool_exec: Arc<dyn ToolExec>,
    image_repository: Arc<dyn ImageRepository>,
    git_commit_resolver: Arc<dyn GitCommitResolver>,
    collector: DataObjectCollector,
}

impl VerificationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        attestation_client: Arc<dyn AttestationClient>,
        gateway_client: Arc<dyn GatewayClient>,
        onchain_registry: Arc<dyn OnChainRegistry>,
        ct_log_client: Arc<dyn CtLogClient>,
        dns_resolver: Arc<dyn DnsCaaResolver>,
        tool_exec: Arc<dyn ToolExec>,
        image_repository: Arc<dyn ImageRepository>,
        git_commit_resolver: Arc<dyn GitCommitResolver>,
    ) -> Self {
        VerificationService {
            attestation_client,
            gateway_client,
            onchain_registry,
            ct_log_client,
            dns_resolver,
            tool_exec,
            image_repository,
            git_commit_resolver,
            collector: DataObjectCollector::new(),
        }
    }

    async fn fetch_role_bundle(
        &self,
        app_id: &str,
        rpc_endpoint: &str,
        supports_info_rpc_endpoint: bool,
    ) -> Result<RoleBundle> {
        let system_info = self
            .attestation_client
            .fetch_system_info(app_id)
            .await
            .with_context(|| format!("fetch system info for {app_id}"))?;
        let instance = system_info
            .instances
            .first()
            .ok_or_else(|| anyhow::anyhow!("Failed to fetch: {app_id} reported no instances"))?;
        let app_info = self
            .attestation_client
            .fetch_app_info(rpc_endpoint, supports_info_rpc_endpoint)
            .await
            .with_context(|| format!("fetch app info from {rpc_endpoint}"))?;

        Ok(RoleBundle {
            quote_hex: instance.quote.clone(),
            event_log: instance.eventlog.clone(),
            image_version: instance.image_version.clone(),
            tcb_info: app_info.tcb_info,
            vm_config: app_info.vm_config,
        })
    }

    fn maybe_onchain(&self, app: &AppVerificationConfig, supports_onchain_kms: bool) -> Option<OnchainCoordinates> {
        if !supports_onchain_kms {
            return None;
        }
        let contract_address = app.kms_contract_address.clone()?;
        let chain_id = app.kms_chain_id?;
        Some(OnchainCoordinates { registry: self.onchain_registry.clone(), chain_id, contract_address })
    }

    async fn resolve_git_commit(&self, image_version: &str) {
        match self.git_commit_resolver.resolve(image_version).await {
            Ok(Some(commit)) => info!(image_version, commit, "resolved git commit for image version"),
            Ok(None) => {}
            Err(e) => warn!(image_version, error = %e, "git commit resolution failed, continuing without it"),
        }
    }

    async fn build_chain(
        &self,
        app: &AppVerificationConfig,
        policy: &VersionPolicy,
        system_info_kms: &tv_types::KmsInfo,
    ) -> Result<Vec<Box<dyn ChainVerifier>>> {
        let supports_onchain_kms = policy.supports_onchain_kms();
        let supports_info_rpc = policy.supports_info_rpc_endpoint();

        let app_bundle = self.fetch_role_bundle(&app.app_id, &app.rpc_endpoint, supports_info_rpc).await?;
        self.resolve_git_commit(&app_bundle.image_version).await;

        if !supports_onchain_kms {
            let app_verifier = ComponentVerifier::new(
                "app",
                app_bundle.quote_hex,
                app_bundle.event_log,
                app_bundle.tcb_info,
                app_bundle.vm_config,
                app_bundle.image_version,
                false,
                None,
                self.tool_exec.clone(),
                self.image_repository.clone(),
                None,
            );
            return Ok(vec![Box::new(LegacyKmsStub), Box::new(LegacyGatewayStub), Box::new(app_verifier)]);
        }

        let onchain = self.maybe_onchain(app, supports_onchain_kms);

        let kms_bundle = self.fetch_role_bundle(&app.kms_app_id, &app.kms_rpc_endpoint, supports_info_rpc).await?;
        let gateway_rpc = system_info_kms.gateway_app_url.clone();
        let gateway_bundle =
            self.fetch_role_bundle(&system_info_kms.gateway_app_id, &gateway_rpc, supports_info_rpc).await?;

        let kms_verifier = ComponentVerifier::new(
            "kms",
            kms_bundle.quote_hex,
            kms_bundle.event_log,
            kms_bundle.tcb_info,
            kms_bundle.vm_config,
            kms_bundle.image_version,
            true,
            None,
            self.tool_exec.clone(),
            self.image_repository.clone(),
            onchain.clone(),
        );

        let gateway_inner = ComponentVerifier::new(
            "gateway",
            gateway_bundle.quote_hex,
            gateway_bundle.event_log,
            gateway_bundle.tcb_info,
            gateway_bundle.vm_config,
            gateway_bundle.image_version,
            true,
            None,
            self.tool_exec.clone(),
            self.image_repository.clone(),
            onchain.clone(),
        );
        let gateway_verifier = GatewayVerifier::new(
            gateway_inner,
            gateway_rpc,
            app.domain.clone(),
            None,
            self.gateway_client.clone(),
            self.ct_log_client.clone(),
            self.dns_resolver.clone(),
            app.approved_ca_issuers.clone(),
        );

        let app_verifier = ComponentVerifier::new(
            "app",
            app_bundle.quote_hex,
            app_bundle.event_log,
            app_bundle.tcb_info,
            app_bundle.vm_config,
            app_bundle.image_version,
            true,
            None,
            self.tool_exec.clone(),
            self.image_repository.clone(),
            onchain,
        );

        Ok(vec![Box::new(kms_verifier), Box::new(gateway_verifier), Box::new(app_verifier)])
    }

    async fn run_chain(&mut self, app: &AppVerificationConfig, flags: &VerificationFlags) -> Result<ChainOutcome> {
        let policy = VersionPolicy::from_base_image(&app.base_image).context("parse base_image version")?;

        // A throwaway fetch purely to read `kms_info` (gateway routing
        // fields); the app's own chain role re-fetches its bundle below.
        let probe = self
            .attestation_client
            .fetch_system_info(&app.app_id)
            .await
            .context("fetch system info")?;

        let mut chain = self.build_chain(app, &policy, &probe.kms_info).await.context("build verifier chain")?;
        let outcome = tv_verifiers::execute_chain(&mut chain, flags, &mut self.collector).await;
        self.collector.configure_verifier_relationships(policy.supports_onchain_kms());
        Ok(outcome)
    }

    /// Runs one full verification (spec §4.4 steps 1-6).
    pub async fn verify(&mut self, app: &AppVerificationConfig, patch: VerificationFlagsPatch) -> VerificationReport {
        self.collector.clear();
        let flags = VerificationFlags::merged(&patch);

        let (failures, raw_errors) = match self.run_chain(app, &flags).await {
            Ok(outcome) => (outcome.failures, outcome.errors.into_iter().map(|e| e.message).collect::<Vec<_>>()),
            Err(e) => (Vec::new(), vec![format!("{e:#}")]),
        };

        let errors: Vec<tv_verifiers::TopLevelError> =
            raw_errors.into_iter().map(|m| tv_verifiers::TopLevelError { message: map_error_message(&m) }).collect();
        let success = errors.is_empty() && failures.is_empty();

        VerificationReport {
            data_objects: mask(&self.collector.get_all_objects()),
            completed_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            errors,
            failures,
            success,
        }
    }
}
