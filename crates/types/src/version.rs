//! Single source of truth for the three version-gated predicates
//! (`supportsInfoRpcEndpoint`, `supportsOnchainKms`, `isLegacyVersion`) and
//! the version-routing table. Every call site consults a `VersionPolicy`
//! rather than comparing version strings itself (spec REDESIGN FLAG, §9).

use crate::error::TypesError;
use std::cmp::Ordering;
use std::fmt;

/// A parsed `dstack[-dev|-nvidia[-dev]]-<M>.<m>.<p>[.b]` base image tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DstackVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub build: Option<u32>,
}

impl DstackVersion {
    /// Parses `base_image` strings such as `dstack-0.5.3`, `dstack-dev-0.5.1`,
    /// `dstack-nvidia-0.5.3.2`, `dstack-nvidia-dev-0.3.6`.
    pub fn parse(base_image: &str) -> Result<Self, TypesError> {
        let rest = base_image
            .strip_prefix("dstack-")
            .ok_or_else(|| TypesError::InvalidVersion(base_image.to_string()))?;

        // Drop the optional `dev`/`nvidia`/`nvidia-dev` qualifier segments,
        // which never contain a digit, to reach the numeric version tail.
        let version_part = rest
            .split('-')
            .find(|segment| segment.chars().next().is_some_and(|c| c.is_ascii_digit()))
            .ok_or_else(|| TypesError::InvalidVersion(base_image.to_string()))?;

        let mut parts = version_part.split('.');
        let major = Self::next_u32(&mut parts, base_image)?;
        let minor = Self::next_u32(&mut parts, base_image)?;
        let patch = Self::next_u32(&mut parts, base_image)?;
        let build = match parts.next() {
            Some(b) => Some(
                b.parse::<u32>()
                    .map_err(|_| TypesError::InvalidVersion(base_image.to_string()))?,
            ),
            None => None,
        };

        Ok(DstackVersion { major, minor, patch, build })
    }

    fn next_u32<'a>(
        parts: &mut impl Iterator<Item = &'a str>,
        base_image: &str,
    ) -> Result<u32, TypesError> {
        parts
            .next()
            .ok_or_else(|| TypesError::InvalidVersion(base_image.to_string()))?
            .parse::<u32>()
            .map_err(|_| TypesError::InvalidVersion(base_image.to_string()))
    }

    fn triple(&self) -> (u32, u32, u32) {
        (self.major, self.minor, self.patch)
    }
}

impl fmt::Display for DstackVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.build {
            Some(b) => write!(f, "{}.{}.{}.{}", self.major, self.minor, self.patch, b),
            None => write!(f, "{}.{}.{}", self.major, self.minor, self.patch),
        }
    }
}

impl PartialOrd for DstackVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DstackVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.triple().cmp(&other.triple())
    }
}

/// The outcome of applying the version-routing rule (spec §4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingResult {
    /// `None` means the computed contract address is invalid/empty.
    pub contract_address: Option<String>,
    pub model_or_domain: String,
}

/// A pure, parsed-once policy object. Built from a `base_image` string and
/// the two upstream fields the routing table can fall back to.
#[derive(Debug, Clone)]
pub struct VersionPolicy {
    version: DstackVersion,
}

impl VersionPolicy {
    pub fn from_base_image(base_image: &str) -> Result<Self, TypesError> {
        Ok(VersionPolicy { version: DstackVersion::parse(base_image)? })
    }

    pub fn version(&self) -> DstackVersion {
        self.version
    }

    fn at_least(&self, major: u32, minor: u32, patch: u32) -> bool {
        self.version >= DstackVersion { major, minor, patch, build: None }
    }

    pub fn supports_info_rpc_endpoint(&self) -> bool {
        self.at_least(0, 5, 0)
    }

    pub fn supports_onchain_kms(&self) -> bool {
        self.at_least(0, 5, 3)
    }

    pub fn is_legacy_version(&self) -> bool {
        !self.supports_onchain_kms()
    }

    /// Implements the version-routing table in spec §4.6:
    ///
    /// | version range   | contract_address      | model_or_domain        |
    /// |------------------|----------------------|-------------------------|
    /// | >= 0.5.3         | `0x<app_id>`          | `gateway_domain_suffix` |
    /// | 0.5.1-0.5.2       | upstream contract_address | `tproxy_base_domain` |
    /// | < 0.5.1           | empty -> invalid      | `tproxy_base_domain`    |
    pub fn route(
        &self,
        app_id: &str,
        upstream_contract_address: Option<&str>,
        gateway_domain_suffix: &str,
        tproxy_base_domain: &str,
    ) -> RoutingResult {
        if self.at_least(0, 5, 3) {
            RoutingResult {
                contract_address: Some(format!("0x{app_id}")),
                model_or_domain: gateway_domain_suffix.to_string(),
            }
        } else if self.at_least(0, 5, 1) {
            RoutingResult {
                contract_address: upstream_contract_address
                    .filter(|addr| !addr.is_empty())
                    .map(str::to_string),
                model_or_domain: tproxy_base_domain.to_string(),
            }
        } else {
            RoutingResult {
                contract_address: None,
                model_or_domain: tproxy_base_domain.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_plain_version() {
        let v = DstackVersion::parse("dstack-0.5.3").unwrap();
        assert_eq!(v, DstackVersion { major: 0, minor: 5, patch: 3, build: None });
    }

    #[test]
    fn parses_dev_and_nvidia_qualifiers() {
        assert_eq!(
            DstackVersion::parse("dstack-dev-0.5.1").unwrap(),
            DstackVersion { major: 0, minor: 5, patch: 1, build: None }
        );
        assert_eq!(
            DstackVersion::parse("dstack-nvidia-0.5.3.2").unwrap(),
            DstackVersion { major: 0, minor: 5, patch: 3, build: Some(2) }
        );
        assert_eq!(
            DstackVersion::parse("dstack-nvidia-dev-0.3.6").unwrap(),
            DstackVersion { major: 0, minor: 3, patch: 6, build: None }
        );
    }

    #[test]
    fn rejects_non_dstack_image() {
        assert!(DstackVersion::parse("ubuntu-22.04").is_err());
    }

    #[test]
    fn predicates_follow_thresholds() {
        let modern = VersionPolicy::from_base_image("dstack-0.5.3").unwrap();
        assert!(modern.supports_info_rpc_endpoint());
        assert!(modern.supports_onchain_kms());
        assert!(!modern.is_legacy_version());

        let mid = VersionPolicy::from_base_image("dstack-0.5.1").unwrap();
        assert!(mid.supports_info_rpc_endpoint());
        assert!(!mid.supports_onchain_kms());
        assert!(mid.is_legacy_version());

        let old = VersionPolicy::from_base_image("dstack-0.3.6").unwrap();
        assert!(!old.supports_info_rpc_endpoint());
        assert!(old.is_legacy_version());
    }

    #[test]
    fn routes_modern_version_to_app_id_contract() {
        let policy = VersionPolicy::from_base_image("dstack-0.5.3").unwrap();
        let result = policy.route("deadbeef", None, "gw.example.com", "tproxy.example.com");
        assert_eq!(result.contract_address.as_deref(), Some("0xdeadbeef"));
        assert_eq!(result.model_or_domain, "gw.example.com");
    }

    #[test]
    fn routes_mid_version_to_upstream_contract() {
        let policy = VersionPolicy::from_base_image("dstack-0.5.2").unwrap();
        let result =
            policy.route("deadbeef", Some("0xfeed"), "gw.example.com", "tproxy.example.com");
        assert_eq!(result.contract_address.as_deref(), Some("0xfeed"));
        assert_eq!(result.model_or_domain, "tproxy.example.com");
    }

    #[test]
    fn routes_legacy_version_to_invalid_contract() {
        let policy = VersionPolicy::from_base_image("dstack-0.3.6").unwrap();
        let result = policy.route("deadbeef", Some("0xfeed"), "gw.example.com", "tproxy.example.com");
        assert_eq!(result.contract_address, None);
        assert_eq!(result.model_or_domain, "tproxy.example.com");
    }

    proptest::proptest! {
        #[test]
        fn routing_is_a_pure_function_of_version_and_upstream(
            major in 0u32..2,
            minor in 0u32..10,
            patch in 0u32..10,
            app_id in "[0-9a-f]{8}",
        ) {
            let base_image = format!("dstack-{major}.{minor}.{patch}");
            let policy = VersionPolicy::from_base_image(&base_image).unwrap();
            let a = policy.route(&app_id, Some("0xfeed"), "gw", "tproxy");
            let b = policy.route(&app_id, Some("0xfeed"), "gw", "tproxy");
            prop_assert_eq!(a.clone(), b);

            if (major, minor, patch) >= (0, 5, 3) {
                prop_assert_eq!(a.contract_address, Some(format!("0x{app_id}")));
                prop_assert_eq!(a.model_or_domain, "gw".to_string());
            } else if (major, minor, patch) >= (0, 5, 1) {
                prop_assert_eq!(a.contract_address, Some("0xfeed".to_string()));
                prop_assert_eq!(a.model_or_domain, "tproxy".to_string());
            } else {
                prop_assert_eq!(a.contract_address, None);
                prop_assert_eq!(a.model_or_domain, "tproxy".to_string());
            }
        }
    }
}
