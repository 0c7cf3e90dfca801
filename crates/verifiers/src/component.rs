use crate::chain::ChainVerifier;
use crate::measurement::{compose_sha256, expected_compose_hash, hex_mr, replay_rtmr};
use crate::objects;
use crate::result::{StepFailure, StepOutcome, VerifyResult};
use async_trait::async_trait;
use std::sync::Arc;
use tv_collector::DataObjectCollector;
use tv_fetchers::tool_exec::{MeasureImagesRequest, ToolExec};
use tv_fetchers::{ImageRepository, OnChainRegistry};
use tv_types::{EventLogEntry, TcbInfo, VmConfig};

/// On-chain registry coordinates needed to check compose-hash registration.
#[derive(Clone)]
pub struct OnchainCoordinates {
    pub registry: Arc<dyn OnChainRegistry>,
    pub chain_id: u64,
    pub contract_address: String,
}

/// Shared verifier for the KMS and App roles: both check hardware, OS, and
/// source code against the same TCB; only App additionally gates on
/// event-log replay (spec §4.3 "for App, an event-log replay must reproduce
/// RTMR0..3").
pub struct ComponentVerifier {
    role: &'static str,
    quote_hex: String,
    event_log: Vec<EventLogEntry>,
    tcb_info: TcbInfo,
    vm_config: VmConfig,
    image_folder_name: String,
    supports_onchain_kms: bool,
    nvidia_payload: Option<serde_json::Value>,
    tool_exec: Arc<dyn ToolExec>,
    image_repository: Arc<dyn ImageRepository>,
    onchain: Option<OnchainCoordinates>,
}

impl ComponentVerifier {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        role: &'static str,
        quote_hex: impl Into<String>,
        event_log: Vec<EventLogEntry>,
        tcb_info: TcbInfo,
        vm_config: VmConfig,
        image_folder_name: impl Into<String>,
        supports_onchain_kms: bool,
        nvidia_payload: Option<serde_json::Value>,
        tool_exec: Arc<dyn ToolExec>,
        image_repository: Arc<dyn ImageRepository>,
        onchain: Option<OnchainCoordinates>,
    ) -> Self {
        ComponentVerifier {
            role,
            quote_hex: quote_hex.into(),
            event_log,
            tcb_info,
            vm_config,
            image_folder_name: image_folder_name.into(),
            supports_onchain_kms,
            nvidia_payload,
            tool_exec,
            image_repository,
            onchain,
        }
    }

    fn main_id(&self) -> String {
        format!("{}-main", self.role)
    }

    fn ensure_main(&self, collector: &mut DataObjectCollector) {
        collector.create_or_update(objects::main_object(self.role));
    }
}

#[async_trait]
impl ChainVerifier for ComponentVerifier {
    fn role(&self) -> &'static str {
        self.role
    }

    async fn verify_hardware(&mut self, collector: &mut DataObjectCollector) -> StepOutcome {
        self.ensure_main(collector);

        let status = self
            .tool_exec
            .verify_quote(&self.quote_hex)
            .await
            .map_err(|e| format!("quote verification tool failed: {e}"))?;
        let status_str = status.get("status").and_then(|v| v.as_str()).unwrap_or("Unknown").to_string();

        let decoded = self
            .tool_exec
            .decode_quote(&self.quote_hex)
            .await
            .map_err(|e| format!("quote decode tool failed: {e}"))?;
        let get = |key: &str| decoded.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let mrtd = get("mrtd");
        let rtmr = [get("rt_mr0"), get("rt_mr1"), get("rt_mr2"), get("rt_mr3")];

        collector.create_or_update(objects::cpu_object(self.role, &status_str));
        collector.create_or_update(objects::quote_object(self.role, &mrtd, &rtmr));

        let mut failures = Vec::new();
        if status_str != "UpToDate" {
            failures.push(StepFailure::new(self.main_id(), "Hardware verification failed: status not UpToDate"));
        }

        for imr in 0..4u8 {
            let replayed = replay_rtmr(imr, &self.event_log);
            collector.create_or_update(objects::event_log_object(self.role, imr, &replayed));
            if self.role == "app" && hex_mr(&replayed) != rtmr[imr as usize] {
                failures.push(StepFailure::new(self.main_id(), format!("RTMR{imr} mismatch during event-log replay")));
            }
        }

        if self.role == "app" {
            if let Some(payload) = &self.nvidia_payload {
                collector.create_or_update(objects::gpu_object(self.role, self.vm_config.num_gpus));
                collector.create_or_update(objects::gpu_quote_object(self.role, payload));
            }
        }

        Ok(if failures.is_empty() { VerifyResult::ok() } else { VerifyResult::failed(failures) })
    }

    async fn verify_operating_system(&mut self, collector: &mut DataObjectCollector) -> StepOutcome {
        self.ensure_main(collector);

        let image_dir =
            self.image_repository.ensure(&self.image_folder_name).await.map_err(|e| format!("image ensure failed: {e}"))?;
        let measured = self
            .tool_exec
            .measure_images(MeasureImagesRequest {
                image_dir: image_dir.display().to_string(),
                vm_config: self.vm_config.clone(),
                legacy: !self.supports_onchain_kms,
            })
            .await
            .map_err(|e| format!("image measurement failed: {e}"))?;

        collector.create_or_update(objects::os_object(self.role, &measured));
        collector.create_or_update(objects::os_code_object(self.role));

        // RTMR3 is deliberately excluded: it's application-specific, not
        // OS-measured (spec §4.3 "OS verification").
        let mut failures = Vec::new();
        if measured.mrtd != self.tcb_info.mrtd {
            failures.push(StepFailure::new(self.main_id(), "MRTD mismatch against expected TCB"));
        }
        if measured.rtmr0 != self.tcb_info.rtmr0 {
            failures.push(StepFailure::new(self.main_id(), "RTMR0 mismatch against expected TCB"));
        }
        if measured.rtmr1 != self.tcb_info.rtmr1 {
            failures.push(StepFailure::new(self.main_id(), "RTMR1 mismatch against expected TCB"));
        }
        if measured.rtmr2 != self.tcb_info.rtmr2 {
            failures.push(StepFailure::new(self.main_id(), "RTMR2 mismatch against expected TCB"));
        }

        Ok(if failures.is_empty() { VerifyResult::ok() } else { VerifyResult::failed(failures) })
    }

    async fn verify_source_code(&mut self, collector: &mut DataObjectCollector) -> StepOutcome {
        self.ensure_main(collector);

        let calculated = compose_sha256(&self.tcb_info.app_compose);
        collector.create_or_update(objects::code_object(self.role, &calculated, &self.tcb_info.app_compose));

        let mut failures = Vec::new();
        match expected_compose_hash(&self.event_log) {
            None => failures.push(StepFailure::new(self.main_id(), "No compose-hash event found in RTMR3 event log")),
            Some(expected) if expected != calculated => {
                failures.push(StepFailure::new(self.main_id(), "Compose hash mismatch between app_compose and RTMR3 event log"))
            }
            Some(_) => {
                if let Some(onchain) = &self.onchain {
                    let registered = onchain
                        .registry
                        .app_compose_hash_registered(onchain.chain_id, &onchain.contract_address, &calculated)
                        .await
                        .map_err(|e| format!("on-chain registry read failed: {e}"))?;
                    if !registered {
                        failures.push(StepFailure::new(self.main_id(), "Compose hash is not registered in the on-chain registry"));
                    }
                }
            }
        }

        Ok(if failures.is_empty() { VerifyResult::ok() } else { VerifyResult::failed(failures) })
    }
}
