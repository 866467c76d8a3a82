use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "DISPATCHER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/dispatcher.toml";
const ENV_PREFIX: &str = "DISPATCHER";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in struct field attributes)
/// 2. TOML file (if it exists)
/// 3. `.env` file (loaded via dotenvy before step 4)
/// 4. `DISPATCHER__`-prefixed environment variables plus the flat, literally-named
///    variables spec §6 calls out (`PORT`, `SYNC_VENDOR_URL`, ...), highest priority.
pub fn load() -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_from_sources(config_path)
}

/// Load configuration from a specific path. Useful for testing with custom config files.
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // Spec §6's flat, literally-named environment variables map onto the
    // corresponding structured fields.
    builder = apply_named_env_vars(builder);

    // Everything else (including the `vendors` table and nested overrides) uses the
    // DISPATCHER__ prefixed convention: DISPATCHER__SYNC_VENDOR__URL, etc.
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

fn apply_named_env_vars(
    mut builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> config::ConfigBuilder<config::builder::DefaultState> {
    let pairs: &[(&str, &str)] = &[
        ("PORT", "port"),
        ("MONGO_URL", "mongo_url"),
        ("REDIS_URL", "redis_url"),
        ("API_BASE_URL", "api_base_url"),
        ("SYNC_VENDOR_URL", "sync_vendor.url"),
        ("SYNC_VENDOR_RATE_LIMIT", "sync_vendor.rate_limit_per_minute"),
        ("SYNC_VENDOR_TIMEOUT", "sync_vendor.timeout_ms"),
        ("ASYNC_VENDOR_URL", "async_vendor.url"),
        ("ASYNC_VENDOR_RATE_LIMIT", "async_vendor.rate_limit_per_minute"),
        ("ASYNC_VENDOR_TIMEOUT", "async_vendor.timeout_ms"),
        ("LOG_LEVEL", "log_level"),
        ("NODE_ENV", "node_env"),
    ];
    for (env_var, field) in pairs {
        if let Ok(value) = env::var(env_var) {
            builder = builder
                .set_override(*field, value)
                .expect("literal env var override path is always valid");
        }
    }
    builder
}
