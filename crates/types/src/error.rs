use thiserror::Error;

/// Errors surfaced while parsing or validating shared data-model types.
#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid base_image version string: {0}")]
    InvalidVersion(String),

    #[error("invalid hex string in field {field}: {source}")]
    InvalidHex {
        field: &'static str,
        #[source]
        source: hex::FromHexError,
    },

    #[error("data object id must be of the form {{component}}-{{aspect}}, got {0:?}")]
    InvalidDataObjectId(String),

    #[error("event log entry has digest longer than 48 bytes ({0} bytes)")]
    DigestTooLong(usize),

    #[error("imr index out of range: {0} (expected 0..=3)")]
    ImrOutOfRange(u8),
}
