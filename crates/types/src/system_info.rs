use crate::error::TypesError;
use serde::{Deserialize, Serialize};

/// One event in an RTMR event log (spec §3 "EventLogEntry").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub imr: u8,
    pub event_type: u32,
    /// Hex-encoded digest, at most 48 bytes once decoded (SHA-384 width).
    pub digest: String,
    pub event: String,
    pub event_payload: String,
}

impl EventLogEntry {
    /// Decodes `digest`, right-pads to 48 bytes, validates the IMR index and
    /// the decoded length per spec §3.
    pub fn decoded_digest(&self) -> Result<[u8; 48], TypesError> {
        if self.imr > 3 {
            return Err(TypesError::ImrOutOfRange(self.imr));
        }
        let raw = hex::decode(self.digest.trim_start_matches("0x"))
            .map_err(|source| TypesError::InvalidHex { field: "digest", source })?;
        if raw.len() > 48 {
            return Err(TypesError::DigestTooLong(raw.len()));
        }
        let mut padded = [0u8; 48];
        padded[..raw.len()].copy_from_slice(&raw);
        Ok(padded)
    }
}

/// `quote` is a hex string; normalized to `0x`-prefixed lowercase by the
/// fetcher that produced it (spec §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteData {
    pub quote: String,
    pub eventlog: Vec<EventLogEntry>,
    pub image_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KmsInfo {
    pub contract_address: Option<String>,
    pub chain_id: Option<u64>,
    /// Of the form `"v0.5.3 (git:<hex>)"`.
    pub version: String,
    pub url: String,
    pub gateway_app_id: String,
    pub gateway_app_url: String,
}

/// The upstream-reported description of a running app (spec §3 "SystemInfo").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub app_id: String,
    pub contract_address: Option<String>,
    pub kms_info: KmsInfo,
    pub instances: Vec<QuoteData>,
}

/// TCB measurements reported inside `AppInfo` (spec §3 "AttestationBundle").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcbInfo {
    pub mrtd: String,
    pub rtmr0: String,
    pub rtmr1: String,
    pub rtmr2: String,
    pub rtmr3: String,
    pub mr_aggregated: String,
    pub os_image_hash: String,
    pub compose_hash: String,
    pub device_id: String,
    /// Raw JSON string of the app's docker-compose manifest.
    pub app_compose: String,
    pub event_log: Vec<EventLogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmConfig {
    pub cpu_count: u32,
    pub memory_size: u64,
    pub num_gpus: u32,
    pub num_nvswitches: u32,
    pub hotplug_off: bool,
    pub qemu_single_pass_add_pages: bool,
    pub pic: bool,
    pub pci_hole64_size: u64,
    pub hugepages: bool,
}

/// Full app info returned by `/prpc/Info` (or synthesized from the legacy
/// `/prpc/Worker.Info` shape — see fetcher conversion, spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppInfo {
    pub tcb_info: TcbInfo,
    pub vm_config: VmConfig,
}

/// `{signing_address, intel_quote, nvidia_payload?, event_log, info}`
/// (spec §3 "AttestationBundle").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationBundle {
    pub signing_address: String,
    pub intel_quote: String,
    pub nvidia_payload: Option<serde_json::Value>,
    pub event_log: Vec<EventLogEntry>,
    pub info: AppInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoded_digest_pads_to_48_bytes() {
        let entry = EventLogEntry {
            imr: 3,
            event_type: 1,
            digest: "aabb".into(),
            event: "compose-hash".into(),
            event_payload: "deadbeef".into(),
        };
        let digest = entry.decoded_digest().unwrap();
        assert_eq!(&digest[..2], &[0xaa, 0xbb]);
        assert_eq!(&digest[2..], &[0u8; 46][..]);
    }

    #[test]
    fn rejects_out_of_range_imr() {
        let entry = EventLogEntry {
            imr: 4,
            event_type: 1,
            digest: "aabb".into(),
            event: "e".into(),
            event_payload: String::new(),
        };
        assert!(entry.decoded_digest().is_err());
    }
}
