use std::time::Duration;

/// Queue defaults (spec §4.5 "Defaults").
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub queue_name: String,
    pub concurrency: usize,
    pub max_attempts: u32,
    pub backoff_delay: Duration,
    pub completed_retention: Duration,
    pub completed_retention_count: u64,
    pub failed_retention: Duration,
    pub failed_retention_count: u64,
    pub verification_timeout: Duration,
    pub reconnect_backoff_cap: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            queue_name: "attestation-verification".to_string(),
            concurrency: 5,
            max_attempts: 3,
            backoff_delay: Duration::from_secs(1),
            completed_retention: Duration::from_secs(3600),
            completed_retention_count: 100,
            failed_retention: Duration::from_secs(24 * 3600),
            failed_retention_count: 1000,
            verification_timeout: Duration::from_secs(5 * 60),
            reconnect_backoff_cap: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_numbers() {
        let config = QueueConfig::default();
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.verification_timeout, Duration::from_secs(300));
    }
}
