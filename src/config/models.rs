use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::humanize::ByteSize;

/// Top-level configuration (SPEC_FULL.md §10.1).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    pub mongo_url: Option<String>,
    pub redis_url: Option<String>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_node_env")]
    pub node_env: String,

    #[serde(default = "default_sync_vendor")]
    pub sync_vendor: VendorEntry,
    #[serde(default = "default_async_vendor")]
    pub async_vendor: VendorEntry,
    /// Additional vendors beyond the two well-known ones, TOML-only (no flat env var
    /// names are reserved for these). Keeps the registry data-driven per §10.1.
    #[serde(default)]
    pub vendors: HashMap<String, VendorEntry>,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: ByteSize,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

/// One entry in the vendor registry: an external vendor's endpoint, rate limit, and
/// response mode.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VendorEntry {
    pub url: String,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub is_async: bool,
}

fn default_port() -> u16 {
    8080
}

fn default_api_base_url() -> String {
    format!("http://localhost:{}", default_port())
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_node_env() -> String {
    "development".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_max_payload_bytes() -> ByteSize {
    ByteSize(5 * 1024 * 1024)
}

fn default_sweep_interval_secs() -> u64 {
    120
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_rate_limit() -> u32 {
    60
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_sync_vendor() -> VendorEntry {
    VendorEntry {
        url: "http://localhost:9001".to_string(),
        rate_limit_per_minute: 60,
        timeout_ms: 5_000,
        is_async: false,
    }
}

fn default_async_vendor() -> VendorEntry {
    VendorEntry {
        url: "http://localhost:9002".to_string(),
        rate_limit_per_minute: 30,
        timeout_ms: 10_000,
        is_async: true,
    }
}

impl Config {
    /// Flattens the named `syncVendor`/`asyncVendor` entries and the TOML-only
    /// `vendors` table into the list the vendor client registers.
    pub fn vendor_configs(&self) -> Vec<crate::vendor::VendorConfig> {
        let named = [("syncVendor", &self.sync_vendor), ("asyncVendor", &self.async_vendor)];
        named
            .into_iter()
            .map(|(name, entry)| entry.to_vendor_config(name))
            .chain(
                self.vendors
                    .iter()
                    .map(|(name, entry)| entry.to_vendor_config(name)),
            )
            .collect()
    }
}

impl VendorEntry {
    fn to_vendor_config(&self, name: &str) -> crate::vendor::VendorConfig {
        crate::vendor::VendorConfig::builder()
            .name(name.to_string())
            .url(self.url.clone())
            .rate_limit_per_minute(self.rate_limit_per_minute)
            .is_async(self.is_async)
            .timeout_ms(self.timeout_ms)
            .build()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            mongo_url: None,
            redis_url: None,
            api_base_url: default_api_base_url(),
            log_level: default_log_level(),
            node_env: default_node_env(),
            sync_vendor: default_sync_vendor(),
            async_vendor: default_async_vendor(),
            vendors: HashMap::new(),
            data_dir: default_data_dir(),
            max_payload_bytes: default_max_payload_bytes(),
            sweep_interval_secs: default_sweep_interval_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.sync_vendor.rate_limit_per_minute, 60);
        assert_eq!(config.async_vendor.rate_limit_per_minute, 30);
        assert!(!config.sync_vendor.is_async);
        assert!(config.async_vendor.is_async);
    }

    #[test]
    fn vendor_configs_includes_named_and_extra_vendors() {
        let mut config = Config::default();
        config.vendors.insert(
            "thirdVendor".to_string(),
            VendorEntry {
                url: "http://localhost:9003".to_string(),
                rate_limit_per_minute: 10,
                timeout_ms: 5_000,
                is_async: false,
            },
        );
        let vendors = config.vendor_configs();
        assert_eq!(vendors.len(), 3);
        assert!(vendors.iter().any(|v| v.name == "syncVendor"));
        assert!(vendors.iter().any(|v| v.name == "asyncVendor"));
        assert!(vendors.iter().any(|v| v.name == "thirdVendor"));
    }
}
