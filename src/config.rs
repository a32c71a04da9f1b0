use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub enable_tracing: bool,
    /// Minor-unit decimal places for all amounts (e.g. 2 for a cent ledger)
    #[serde(default = "default_decimals")]
    pub asset_decimals: u32,
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub bus: BusConfig,
    /// PostgreSQL connection URL for the wallet/transaction stores.
    /// When absent, the in-memory stores are used.
    #[serde(default)]
    pub postgres_url: Option<String>,
}

fn default_decimals() -> u32 {
    2
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LockConfig {
    /// Lock lease in milliseconds. Bounds both the wait to acquire and the
    /// maximum hold time of a crashed holder.
    pub lease_ms: u64,
    /// Polling interval while waiting for a contended key.
    pub poll_interval_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lease_ms: 10_000,
            poll_interval_ms: 20,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BusConfig {
    /// Per-subscriber channel capacity.
    pub queue_size: usize,
    /// Maximum delivery attempts for a transfer intent before it is dropped.
    pub max_delivery_attempts: u32,
    /// Delay before an intent is redelivered after a retryable failure.
    pub redelivery_delay_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            queue_size: 1024,
            max_delivery_attempts: 5,
            redelivery_delay_ms: 500,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: "./logs".to_string(),
            log_file: "wallet_core.log".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
            enable_tracing: true,
            asset_decimals: default_decimals(),
            lock: LockConfig::default(),
            bus: BusConfig::default(),
            postgres_url: None,
        }
    }
}

impl AppConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load from path if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &str) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Config {} not loaded ({}), using defaults", path, e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.asset_decimals, 2);
        assert_eq!(config.lock.lease_ms, 10_000);
        assert_eq!(config.bus.queue_size, 1024);
        assert!(config.postgres_url.is_none());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
log_level: debug
log_dir: ./logs
log_file: wallet.log
use_json: true
rotation: hourly
enable_tracing: true
asset_decimals: 8
lock:
  lease_ms: 5000
  poll_interval_ms: 10
bus:
  queue_size: 256
  max_delivery_attempts: 3
  redelivery_delay_ms: 100
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.asset_decimals, 8);
        assert_eq!(config.lock.lease_ms, 5000);
        assert_eq!(config.bus.max_delivery_attempts, 3);
    }
}
