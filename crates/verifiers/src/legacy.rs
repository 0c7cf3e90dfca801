use crate::chain::ChainVerifier;
use crate::result::{StepOutcome, VerifyResult};
use async_trait::async_trait;
use tv_collector::DataObjectCollector;
use tv_types::DataObject;

/// Pre-0.5.3 dstack releases predate the on-chain KMS; the verifier chain
/// falls back to these stubs, which emit three hard-coded DataObjects each
/// and never make a network call (spec §4.3 "Chain selection").
pub struct LegacyKmsStub;
pub struct LegacyGatewayStub;

fn stub_main(role: &str) -> DataObject {
    DataObject::new(format!("{role}-main"), format!("{role} main (legacy)"), "Pre-0.5.3 release, unverifiable on-chain".to_string())
        .expect("valid id")
}

fn stub_cpu(role: &str) -> DataObject {
    DataObject::new(format!("{role}-cpu"), format!("{role} cpu (legacy)"), "Legacy release predates DCAP reporting".to_string())
        .expect("valid id")
        .with_field("verification_status", "not_applicable")
}

fn stub_source(role: &str) -> DataObject {
    DataObject::new(format!("{role}-source"), format!("{role} source (legacy)"), "Legacy release predates on-chain compose-hash registry".to_string())
        .expect("valid id")
}

#[async_trait]
impl ChainVerifier for LegacyKmsStub {
    fn role(&self) -> &'static str {
        "kms"
    }

    async fn verify_hardware(&mut self, collector: &mut DataObjectCollector) -> StepOutcome {
        collector.create_or_update(stub_main("kms"));
        collector.create_or_update(stub_cpu("kms"));
        Ok(VerifyResult::ok())
    }

    async fn verify_operating_system(&mut self, _collector: &mut DataObjectCollector) -> StepOutcome {
        Ok(VerifyResult::ok())
    }

    async fn verify_source_code(&mut self, collector: &mut DataObjectCollector) -> StepOutcome {
        collector.create_or_update(stub_source("kms"));
        Ok(VerifyResult::ok())
    }
}

#[async_trait]
impl ChainVerifier for LegacyGatewayStub {
    fn role(&self) -> &'static str {
        "gateway"
    }

    async fn verify_hardware(&mut self, collector: &mut DataObjectCollector) -> StepOutcome {
        collector.create_or_update(stub_main("gateway"));
        collector.create_or_update(stub_cpu("gateway"));
        Ok(VerifyResult::ok())
    }

    async fn verify_operating_system(&mut self, _collector: &mut DataObjectCollector) -> StepOutcome {
        Ok(VerifyResult::ok())
    }

    async fn verify_source_code(&mut self, collector: &mut DataObjectCollector) -> StepOutcome {
        collector.create_or_update(stub_source("gateway"));
        Ok(VerifyResult::ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn kms_stub_emits_exactly_three_objects() {
        let mut collector = DataObjectCollector::new();
        let mut stub = LegacyKmsStub;
        stub.verify_hardware(&mut collector).await.unwrap();
        stub.verify_operating_system(&mut collector).await.unwrap();
        stub.verify_source_code(&mut collector).await.unwrap();
        assert_eq!(collector.get_all_objects().len(), 3);
    }
}
