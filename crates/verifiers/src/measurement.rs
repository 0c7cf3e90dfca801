//! Pure measurement primitives shared by every concrete verifier: RTMR
//! event-log replay (spec §4.3 "Event-log replay") and compose-hash
//! recomputation (spec §4.3 "Compose-hash verification").

use sha2::{Digest, Sha384};
use tv_types::EventLogEntry;

/// Replays the SHA-384 chain for IMR `imr_index`: starting from 48 zero
/// bytes, for each event with `imr == imr_index`, extend with its decoded
/// (right-padded) digest. The result must equal the TD report's `rt_mr<i>`
/// for hardware verification to pass (property P5).
pub fn replay_rtmr(imr_index: u8, event_log: &[EventLogEntry]) -> [u8; 48] {
    let mut mr = [0u8; 48];
    for event in event_log.iter().filter(|e| e.imr == imr_index) {
        let Ok(digest) = event.decoded_digest() else { continue };
        let mut hasher = Sha384::new();
        hasher.update(mr);
        hasher.update(digest);
        mr.copy_from_slice(&hasher.finalize());
    }
    mr
}

pub fn hex_mr(mr: &[u8; 48]) -> String {
    format!("0x{}", hex::encode(mr))
}

/// `SHA-256(app_compose)`, compared against the `compose-hash` event's
/// payload in the RTMR3 log.
pub fn compose_sha256(app_compose: &str) -> String {
    use sha2::Sha256;
    let digest = Sha256::digest(app_compose.as_bytes());
    format!("0x{}", hex::encode(digest))
}

/// Finds the RTMR3 event log entry named `compose-hash` and returns its
/// expected-hash payload.
pub fn expected_compose_hash(event_log: &[EventLogEntry]) -> Option<&str> {
    event_log
        .iter()
        .find(|e| e.imr == 3 && e.event == "compose-hash")
        .map(|e| e.event_payload.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(imr: u8, digest: &str) -> EventLogEntry {
        EventLogEntry { imr, event_type: 1, digest: digest.to_string(), event: "boot".into(), event_payload: String::new() }
    }

    #[test]
    fn empty_log_leaves_mr_at_zero() {
        assert_eq!(replay_rtmr(0, &[]), [0u8; 48]);
    }

    #[test]
    fn replay_only_considers_matching_imr() {
        let log = vec![event(0, "aa"), event(1, "bb")];
        let mr0 = replay_rtmr(0, &log);
        let mut only_zero = [0u8; 48];
        only_zero[0] = 0xaa;
        let mut hasher = Sha384::new();
        hasher.update([0u8; 48]);
        hasher.update(only_zero);
        let expected: [u8; 48] = hasher.finalize().into();
        assert_eq!(mr0, expected);
    }

    #[test]
    fn compose_hash_matches_expected_event_payload() {
        let expected = compose_sha256("{\"a\":1}");
        let log = vec![EventLogEntry {
            imr: 3,
            event_type: 1,
            digest: String::new(),
            event: "compose-hash".into(),
            event_payload: expected.clone(),
        }];
        assert_eq!(expected_compose_hash(&log), Some(expected.as_str()));
    }
}
