use crate::config::types::{
    AutoThrottleConfig, Config, CrawlerConfig, OutputConfig, RetryConfig, UserAgentConfig,
    MAX_DURATION_SECS,
};
use crate::ConfigError;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_autothrottle_config(&config.autothrottle, &config.crawler)?;
    validate_retry_config(&config.retry)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Creates the store root if needed and checks that files can be created in it
///
/// An unwritable store root is fatal at startup rather than surfacing later as
/// a failure on every archived document.
pub fn ensure_store_root(path: &Path) -> Result<(), ConfigError> {
    std::fs::create_dir_all(path)
        .map_err(|e| ConfigError::StoreRoot(format!("{}: {}", path.display(), e)))?;

    tempfile::NamedTempFile::new_in(path)
        .map(drop)
        .map_err(|e| ConfigError::StoreRoot(format!("{}: {}", path.display(), e)))
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.start_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid start URL '{}': {}", config.start_url, e))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Start URL '{}' must use http or https",
            config.start_url
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "Start URL '{}' has no host",
            config.start_url
        )));
    }

    validate_seconds("download_delay", config.download_delay)?;

    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_requests must be between 1 and 100, got {}",
            config.max_concurrent_requests
        )));
    }

    validate_seconds("request_timeout", config.request_timeout)?;
    if config.request_timeout == 0.0 {
        return Err(ConfigError::Validation(
            "request_timeout must be positive, got 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates adaptive throttle configuration against the base delay
fn validate_autothrottle_config(
    config: &AutoThrottleConfig,
    crawler: &CrawlerConfig,
) -> Result<(), ConfigError> {
    if !config.enabled {
        return Ok(());
    }

    validate_seconds("autothrottle start_delay", config.start_delay)?;
    validate_seconds("autothrottle max_delay", config.max_delay)?;

    if config.max_delay < crawler.download_delay {
        return Err(ConfigError::Validation(format!(
            "autothrottle max_delay ({}) must be >= download_delay ({})",
            config.max_delay, crawler.download_delay
        )));
    }

    if !config.target_concurrency.is_finite() || config.target_concurrency <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "autothrottle target_concurrency must be positive, got {}",
            config.target_concurrency
        )));
    }

    Ok(())
}

/// Validates retry configuration
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "retry max_attempts must be >= 1".to_string(),
        ));
    }

    if let Some(code) = config.http_codes.iter().find(|c| !(100..=599).contains(*c)) {
        return Err(ConfigError::Validation(format!(
            "retry http_codes contains invalid status {}",
            code
        )));
    }

    validate_seconds("retry backoff_base", config.backoff_base)?;
    validate_seconds("retry backoff_max", config.backoff_max)?;

    if config.backoff_max < config.backoff_base {
        return Err(ConfigError::Validation(format!(
            "retry backoff_max ({}) must be >= backoff_base ({})",
            config.backoff_max, config.backoff_base
        )));
    }

    Ok(())
}

/// Checks that a seconds value is a usable duration
fn validate_seconds(name: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=MAX_DURATION_SECS).contains(&value) || Duration::try_from_secs_f64(value).is_err() {
        return Err(ConfigError::Validation(format!(
            "{} must be between 0 and {} seconds, got {}",
            name, MAX_DURATION_SECS, value
        )));
    }
    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    for agent in &config.pool {
        if agent.trim().is_empty() {
            return Err(ConfigError::Validation(
                "user agent pool entries cannot be empty".to_string(),
            ));
        }

        // Must be usable as an HTTP header value
        if agent.chars().any(|c| c.is_control()) {
            return Err(ConfigError::Validation(format!(
                "user agent '{}' contains control characters",
                agent.escape_debug()
            )));
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.store_root.is_empty() {
        return Err(ConfigError::Validation(
            "store_root cannot be empty".to_string(),
        ));
    }

    for extension in &config.extensions {
        validate_extension(extension)?;
    }

    Ok(())
}

/// Validates an allowlist entry such as `.pdf`
fn validate_extension(extension: &str) -> Result<(), ConfigError> {
    if !extension.starts_with('.') || extension.len() < 2 {
        return Err(ConfigError::Validation(format!(
            "extension '{}' must start with '.' followed by a suffix",
            extension
        )));
    }

    if extension.contains('/') {
        return Err(ConfigError::Validation(format!(
            "extension '{}' cannot contain '/'",
            extension
        )));
    }

    Ok(())
}
