//! Layered configuration for the dispatch service (SPEC_FULL.md §10.1).
//!
//! Loaded from, in increasing priority:
//! 1. Defaults (embedded in struct field attributes)
//! 2. TOML configuration file
//! 3. `.env` file (via `dotenvy`)
//! 4. Environment variables, both the flat names spec §6 calls out (`PORT`,
//!    `SYNC_VENDOR_URL`, ...) and `DISPATCHER__`-prefixed overrides for everything
//!    else.

mod models;
mod sources;
mod validation;

pub use models::{Config, VendorEntry};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("configuration validation failed: {0}")]
    Validation(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment), then validate it.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path. Useful for testing with custom
    /// configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
