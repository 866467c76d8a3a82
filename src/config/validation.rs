use super::models::Config;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("duplicate vendor name '{0}': collides with a built-in vendor")]
    DuplicateVendorName(String),

    #[error("vendor '{0}' has rateLimitPerMinute == 0")]
    ZeroRateLimit(String),

    #[error("vendor '{vendor}' url '{url}' must start with http:// or https://")]
    InvalidVendorUrl { vendor: String, url: String },

    #[error("sweep_interval_secs must be positive")]
    ZeroSweepInterval,

    #[error("cache_ttl_secs must be positive")]
    ZeroCacheTtl,

    #[error("max_payload_bytes must be positive")]
    ZeroMaxPayloadBytes,
}

/// Validate the entire configuration (SPEC_FULL.md §10.1).
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_vendors(config)?;
    validate_intervals(config)?;
    Ok(())
}

fn validate_vendor_url(vendor: &str, url: &str) -> Result<(), ValidationError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ValidationError::InvalidVendorUrl {
            vendor: vendor.to_string(),
            url: url.to_string(),
        });
    }
    Ok(())
}

fn validate_vendors(config: &Config) -> Result<(), ValidationError> {
    let mut seen: HashSet<&str> = HashSet::new();
    seen.insert("syncVendor");
    seen.insert("asyncVendor");

    validate_vendor_url("syncVendor", &config.sync_vendor.url)?;
    validate_vendor_url("asyncVendor", &config.async_vendor.url)?;
    if config.sync_vendor.rate_limit_per_minute == 0 {
        return Err(ValidationError::ZeroRateLimit("syncVendor".to_string()));
    }
    if config.async_vendor.rate_limit_per_minute == 0 {
        return Err(ValidationError::ZeroRateLimit("asyncVendor".to_string()));
    }

    for (name, entry) in &config.vendors {
        if !seen.insert(name.as_str()) {
            return Err(ValidationError::DuplicateVendorName(name.clone()));
        }
        validate_vendor_url(name, &entry.url)?;
        if entry.rate_limit_per_minute == 0 {
            return Err(ValidationError::ZeroRateLimit(name.clone()));
        }
    }

    Ok(())
}

fn validate_intervals(config: &Config) -> Result<(), ValidationError> {
    if config.sweep_interval_secs == 0 {
        return Err(ValidationError::ZeroSweepInterval);
    }
    if config.cache_ttl_secs == 0 {
        return Err(ValidationError::ZeroCacheTtl);
    }
    if config.max_payload_bytes.as_u64() == 0 {
        return Err(ValidationError::ZeroMaxPayloadBytes);
    }
    Ok(())
}
