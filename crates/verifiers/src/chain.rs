use crate::flags::VerificationFlags;
use crate::result::{ChainOutcome, StepOutcome, TopLevelError};
use async_trait::async_trait;
use tv_collector::DataObjectCollector;

/// The common contract every concrete verifier and legacy stub implements
/// (spec §4.3). Gateway-only steps default to "not applicable" (`Ok(None)`)
/// so `execute_chain` can drive every verifier through the same fixed step
/// order without type-erasing Gateway separately.
#[async_trait]
pub trait ChainVerifier: Send + Sync {
    fn role(&self) -> &'static str;

    async fn verify_hardware(&mut self, collector: &mut DataObjectCollector) -> StepOutcome;
    async fn verify_operating_system(&mut self, collector: &mut DataObjectCollector) -> StepOutcome;
    async fn verify_source_code(&mut self, collector: &mut DataObjectCollector) -> StepOutcome;

    async fn verify_tee_controlled_key(&mut self, _collector: &mut DataObjectCollector) -> Option<StepOutcome> {
        None
    }
    async fn verify_certificate_key(&mut self, _collector: &mut DataObjectCollector) -> Option<StepOutcome> {
        None
    }
    async fn verify_dns_caa(&mut self, _collector: &mut DataObjectCollector) -> Option<StepOutcome> {
        None
    }
    async fn verify_ct_log(&mut self, _collector: &mut DataObjectCollector) -> Option<StepOutcome> {
        None
    }
}

/// Drives every verifier in `chain` through the fixed step order
/// (`hardware, os, sourceCode`, then the Gateway-only domain steps),
/// skipping a step when its flag is false. A step's `Err` (exception) does
/// not skip the remaining verifiers — it's collected into `errors` and the
/// chain continues (spec §4.3 "Step dispatch", §7).
pub async fn execute_chain(
    chain: &mut [Box<dyn ChainVerifier>],
    flags: &VerificationFlags,
    collector: &mut DataObjectCollector,
) -> ChainOutcome {
    let mut outcome = ChainOutcome::default();

    for verifier in chain.iter_mut() {
        if flags.hardware {
            record(verifier.verify_hardware(collector).await, &mut outcome);
        }
        if flags.os {
            record(verifier.verify_operating_system(collector).await, &mut outcome);
        }
        if flags.source_code {
            record(verifier.verify_source_code(collector).await, &mut outcome);
        }
        if flags.tee_controlled_key {
            record_optional(verifier.verify_tee_controlled_key(collector).await, &mut outcome);
        }
        if flags.certificate_key {
            record_optional(verifier.verify_certificate_key(collector).await, &mut outcome);
        }
        if flags.dns_caa {
            record_optional(verifier.verify_dns_caa(collector).await, &mut outcome);
        }
        if flags.ct_log {
            record_optional(verifier.verify_ct_log(collector).await, &mut outcome);
        }
    }

    outcome
}

fn record(result: StepOutcome, outcome: &mut ChainOutcome) {
    match result {
        Ok(r) => outcome.failures.extend(r.failures),
        Err(message) => outcome.errors.push(TopLevelError { message }),
    }
}

fn record_optional(result: Option<StepOutcome>, outcome: &mut ChainOutcome) {
    if let Some(r) = result {
        record(r, outcome);
    }
}
