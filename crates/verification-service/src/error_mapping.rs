//! Per-call error message mapping (spec §4.4).

/// Maps a raw error string to the user-facing message shown in the
/// top-level `errors[]` channel.
pub fn map_error_message(raw: &str) -> String {
    if raw.is_empty() {
        return "Unknown verification error occurred".to_string();
    }
    if raw.contains("fetch() URL is invalid") {
        "Verification failed due to invalid URL configuration".to_string()
    } else if raw.contains("Failed to fetch") {
        format!("Network error during verification: {raw}")
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_invalid_url() {
        assert_eq!(
            map_error_message("fetch() URL is invalid: ://bad"),
            "Verification failed due to invalid URL configuration"
        );
    }

    #[test]
    fn maps_network_error() {
        assert_eq!(map_error_message("Failed to fetch"), "Network error during verification: Failed to fetch");
    }

    #[test]
    fn passes_through_other_messages() {
        assert_eq!(map_error_message("quote decode tool failed: exit 1"), "quote decode tool failed: exit 1");
    }

    #[test]
    fn empty_message_has_fallback() {
        assert_eq!(map_error_message(""), "Unknown verification error occurred");
    }
}
