/// The seven step flags, consulted in this fixed order by `execute_chain`
/// (spec §4.3 "Step dispatch"). Default is all true except `ct_log`, which
/// the service-level default keeps off (spec §9 open question).
#[derive(Debug, Clone, Copy)]
pub struct VerificationFlags {
    pub hardware: bool,
    pub os: bool,
    pub source_code: bool,
    pub tee_controlled_key: bool,
    pub certificate_key: bool,
    pub dns_caa: bool,
    pub ct_log: bool,
}

impl Default for VerificationFlags {
    fn default() -> Self {
        VerificationFlags {
            hardware: true,
            os: true,
            source_code: true,
            tee_controlled_key: true,
            certificate_key: true,
            dns_caa: true,
            ct_log: false,
        }
    }
}

impl VerificationFlags {
    /// Merges `overrides` over the defaults field-by-field (spec §4.4 step 2).
    pub fn merged(overrides: &VerificationFlagsPatch) -> Self {
        let defaults = VerificationFlags::default();
        VerificationFlags {
            hardware: overrides.hardware.unwrap_or(defaults.hardware),
            os: overrides.os.unwrap_or(defaults.os),
            source_code: overrides.source_code.unwrap_or(defaults.source_code),
            tee_controlled_key: overrides.tee_controlled_key.unwrap_or(defaults.tee_controlled_key),
            certificate_key: overrides.certificate_key.unwrap_or(defaults.certificate_key),
            dns_caa: overrides.dns_caa.unwrap_or(defaults.dns_caa),
            ct_log: overrides.ct_log.unwrap_or(defaults.ct_log),
        }
    }
}

/// The wire-facing partial form of `VerificationFlags` (all fields optional).
#[derive(Debug, Clone, Copy, Default, serde::Deserialize, serde::Serialize)]
pub struct VerificationFlagsPatch {
    pub hardware: Option<bool>,
    pub os: Option<bool>,
    pub source_code: Option<bool>,
    pub tee_controlled_key: Option<bool>,
    pub certificate_key: Option<bool>,
    pub dns_caa: Option<bool>,
    pub ct_log: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_flags_are_all_true_except_ct_log() {
        let flags = VerificationFlags::default();
        assert!(flags.hardware && flags.os && flags.source_code);
        assert!(flags.tee_controlled_key && flags.certificate_key && flags.dns_caa);
        assert!(!flags.ct_log);
    }

    #[test]
    fn merged_overrides_only_named_fields() {
        let patch = VerificationFlagsPatch { ct_log: Some(true), hardware: Some(false), ..Default::default() };
        let flags = VerificationFlags::merged(&patch);
        assert!(flags.ct_log);
        assert!(!flags.hardware);
        assert!(flags.os);
    }
}
