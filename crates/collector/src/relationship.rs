use tv_types::MeasuredBy;

/// A relationship request: bind `measured_by` onto the object identified by
/// `target_object_id` once it exists (spec §4.2 "addRelationships").
#[derive(Debug, Clone)]
pub struct Relationship {
    pub target_object_id: String,
    pub measured_by: MeasuredBy,
}

impl Relationship {
    pub fn new(target_object_id: impl Into<String>, measured_by: MeasuredBy) -> Self {
        Relationship { target_object_id: target_object_id.into(), measured_by }
    }
}

fn id_only_edge(source_object_id: &str) -> MeasuredBy {
    MeasuredBy {
        source_object_id: source_object_id.to_string(),
        source_field: None,
        source_calc_output: None,
        self_field: None,
        self_calc_output: None,
    }
}

fn field_edge(source_object_id: &str, source_field: &str, self_field: &str) -> MeasuredBy {
    MeasuredBy {
        source_object_id: source_object_id.to_string(),
        source_field: Some(source_field.to_string()),
        source_calc_output: None,
        self_field: Some(self_field.to_string()),
        self_calc_output: None,
    }
}

/// Builds the fixed `kms-main` → `{gateway-main, app-main}` wiring from the
/// relationship table (spec §6). With on-chain KMS, fine-grained field edges
/// are used; otherwise a plain id-to-id edge stands in for each row.
pub fn kms_wiring(onchain_kms: bool) -> Vec<Relationship> {
    const KMS: &str = "kms-main";
    const GATEWAY: &str = "gateway-main";
    const APP: &str = "app-main";

    if onchain_kms {
        vec![
            Relationship::new(GATEWAY, field_edge(KMS, "gateway_app_id", "app_id")),
            Relationship::new(GATEWAY, field_edge(KMS, "cert_pubkey", "app_cert")),
            Relationship::new(APP, field_edge(KMS, "cert_pubkey", "app_cert")),
        ]
    } else {
        vec![
            Relationship::new(GATEWAY, id_only_edge(KMS)),
            Relationship::new(GATEWAY, id_only_edge(KMS)),
            Relationship::new(APP, id_only_edge(KMS)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn onchain_wiring_has_three_field_edges() {
        let edges = kms_wiring(true);
        assert_eq!(edges.len(), 3);
        assert!(edges.iter().all(|e| e.measured_by.source_field.is_some()));
    }

    #[test]
    fn offchain_wiring_is_id_only() {
        let edges = kms_wiring(false);
        assert!(edges.iter().all(|e| e.measured_by.source_field.is_none()));
    }
}
