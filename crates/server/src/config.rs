use std::env;
use std::time::Duration;

/// Process-wide configuration loaded from the environment (spec §6
/// "Configuration (environment)"). Every field here is read once at
/// startup; nothing in this binary re-reads the environment afterward.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub node_env: String,
    pub database_url: String,
    pub redis_url: String,
    pub queue_name: String,
    pub queue_concurrency: usize,
    pub queue_max_attempts: u32,
    pub queue_backoff_delay: Duration,
    pub db_monitor_poll_interval: Duration,
    pub cleanup_cron_pattern: String,
    pub profile_cron_pattern: String,
    pub tasks_cron_pattern: String,
    pub cron_api_key: String,
    pub metabase_url: String,
    pub metabase_api_key: String,
    pub s3_endpoint: Option<String>,
    pub s3_access_key_id: String,
    pub s3_secret_access_key: String,
    pub s3_bucket: String,
    pub ita_api_key: Option<String>,

    /// Adapter endpoints the enumerated spec env vars don't name directly;
    /// operator-configured the same way `AppVerificationConfig.kms_app_id`
    /// is (see DESIGN.md).
    pub cloud_endpoint: String,
    pub ct_aggregator_base: String,
    pub tool_binary_path: String,
    pub image_cache_dir: String,
    pub image_download_base_url: String,
    pub onchain_rpc_endpoints: std::collections::HashMap<u64, String>,
}

fn env_var(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(ServerConfig {
            port: env_parse("PORT", 3000),
            host: env_var("HOST", "localhost"),
            node_env: env_var("NODE_ENV", "development"),
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")?,
            queue_name: env_var("QUEUE_NAME", "attestation-verification"),
            queue_concurrency: env_parse("QUEUE_CONCURRENCY", 5),
            queue_max_attempts: env_parse("QUEUE_MAX_ATTEMPTS", 3),
            queue_backoff_delay: Duration::from_millis(env_parse("QUEUE_BACKOFF_DELAY", 1000)),
            db_monitor_poll_interval: Duration::from_millis(env_parse("DB_MONITOR_POLL_INTERVAL", 30_000)),
            cleanup_cron_pattern: env_var("CLEANUP_CRON_PATTERN", "0 0 3 * * *"),
            profile_cron_pattern: env_var("PROFILE_CRON_PATTERN", "0 */15 * * * *"),
            tasks_cron_pattern: env_var("TASKS_CRON_PATTERN", "0 */5 * * * *"),
            cron_api_key: env_var("CRON_API_KEY", ""),
            metabase_url: env_var("METABASE_URL", ""),
            metabase_api_key: env_var("METABASE_API_KEY", ""),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            s3_access_key_id: env_var("S3_ACCESS_KEY_ID", ""),
            s3_secret_access_key: env_var("S3_SECRET_ACCESS_KEY", ""),
            s3_bucket: env::var("S3_BUCKET")?,
            ita_api_key: env::var("ITA_API_KEY").ok(),

            cloud_endpoint: env_var("CLOUD_ENDPOINT", "https://cloud-api.phala.network"),
            ct_aggregator_base: env_var("CT_AGGREGATOR_BASE", "https://crt.sh"),
            tool_binary_path: env_var("TOOL_BINARY_PATH", "dstack-mr"),
            image_cache_dir: env_var("IMAGE_CACHE_DIR", "/var/cache/tv-server/images"),
            image_download_base_url: env_var("IMAGE_DOWNLOAD_BASE_URL", "https://images.dstack-tee.io"),
            onchain_rpc_endpoints: parse_rpc_endpoints(&env_var("ONCHAIN_RPC_ENDPOINTS", "")),
        })
    }
}

/// Parses `chain_id=url,chain_id=url` into a lookup map; malformed entries
/// are skipped with a warning rather than failing startup.
fn parse_rpc_endpoints(raw: &str) -> std::collections::HashMap<u64, String> {
    let mut map = std::collections::HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match entry.split_once('=') {
            Some((chain_id, url)) => match chain_id.parse::<u64>() {
                Ok(id) => {
                    map.insert(id, url.to_string());
                }
                Err(_) => tracing::warn!(entry, "ignoring malformed ONCHAIN_RPC_ENDPOINTS entry"),
            },
            None => tracing::warn!(entry, "ignoring malformed ONCHAIN_RPC_ENDPOINTS entry"),
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiple_chain_entries() {
        let map = parse_rpc_endpoints("1=https://eth.example,56=https://bsc.example");
        assert_eq!(map.get(&1), Some(&"https://eth.example".to_string()));
        assert_eq!(map.get(&56), Some(&"https://bsc.example".to_string()));
    }

    #[test]
    fn skips_malformed_entries() {
        let map = parse_rpc_endpoints("not-a-pair,1=https://eth.example,abc=https://bad.example");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&1), Some(&"https://eth.example".to_string()));
    }

    #[test]
    fn empty_input_yields_empty_map() {
        assert!(parse_rpc_endpoints("").is_empty());
    }
}
