use std::collections::HashSet;

use super::{types::Config, AuthMethod, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Auth section exists (enforced by serde)
/// - Server port is not 0
/// - API key auth carries a key
/// - Provider names are unique and non-empty, URLs are http(s)
/// - Scheduler and search intervals are non-zero
/// - Naming pattern is not empty
/// - Post-processing has a download directory when enabled
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    if config.auth.method == AuthMethod::ApiKey
        && config.auth.api_key.as_deref().map_or(true, str::is_empty)
    {
        return Err(invalid("auth.api_key is required when auth.method = \"api_key\""));
    }

    let mut names = HashSet::new();
    for provider in &config.providers {
        if provider.name.trim().is_empty() {
            return Err(invalid("providers[].name cannot be empty"));
        }
        if !names.insert(provider.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate provider name '{}'",
                provider.name
            )));
        }
        if !provider.url.starts_with("http://") && !provider.url.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "provider '{}' url must start with http:// or https://",
                provider.name
            )));
        }
    }

    if config.search.daily_interval_minutes == 0 {
        return Err(invalid("search.daily_interval_minutes cannot be 0"));
    }
    if config.search.backlog_interval_minutes == 0 {
        return Err(invalid("search.backlog_interval_minutes cannot be 0"));
    }
    if config.post_processing.interval_minutes == 0 {
        return Err(invalid("post_processing.interval_minutes cannot be 0"));
    }
    if config.scheduler.queue_cycle_ms == 0 || config.scheduler.tick_ms == 0 {
        return Err(invalid("scheduler intervals cannot be 0"));
    }

    if config.library.naming_pattern.trim().is_empty() {
        return Err(invalid("library.naming_pattern cannot be empty"));
    }

    if config.post_processing.enabled && config.post_processing.download_dir.is_none() {
        return Err(invalid(
            "post_processing.download_dir is required when post-processing is enabled",
        ));
    }

    Ok(())
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::ValidationError(msg.to_string())
}
