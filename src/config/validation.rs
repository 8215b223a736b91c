use crate::config::types::{
    Config, OutputConfig, OutputMode, RequestConfig, RequestType, TargetConfig,
    MAX_INTERVAL_SECS, MIN_TIMEOUT,
};
use crate::ConfigError;
use reqwest::header::{HeaderName, HeaderValue};
use std::time::Duration;

/// Highest accepted bonus respawn percentage
const MAX_BONUS_RESPAWN: u8 = 99;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_target_config(&config.target)?;
    validate_request_config(&config.request)?;
    validate_output_config(&config.output)?;
    validate_mode_combination(&config.request, &config.output)?;
    Ok(())
}

/// Validates the target configuration
fn validate_target_config(config: &TargetConfig) -> Result<(), ConfigError> {
    if config.file.trim().is_empty() {
        return Err(ConfigError::Validation(
            "target file cannot be empty".to_string(),
        ));
    }

    if config.file.contains("://") {
        let url = url::Url::parse(&config.file).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid target '{}': {}", config.file, e))
        })?;

        if !matches!(url.scheme(), "http" | "https" | "file") {
            return Err(ConfigError::InvalidUrl(format!(
                "Target '{}' must use http, https or file scheme",
                config.file
            )));
        }
    }

    Ok(())
}

/// Validates request configuration
fn validate_request_config(config: &RequestConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be >= 1, got {}",
            config.concurrency
        )));
    }

    if !within_interval(config.timeout, MIN_TIMEOUT) {
        return Err(ConfigError::Validation(format!(
            "timeout must be between {} and {} seconds, got {}",
            MIN_TIMEOUT, MAX_INTERVAL_SECS, config.timeout
        )));
    }

    if config.bonus_respawn > MAX_BONUS_RESPAWN {
        return Err(ConfigError::Validation(format!(
            "bonus_respawn must be between 0 and {}, got {}",
            MAX_BONUS_RESPAWN, config.bonus_respawn
        )));
    }

    if config.spawn_delay_max < config.spawn_delay_min {
        return Err(ConfigError::Validation(format!(
            "spawn_delay_max ({}) must be >= spawn_delay_min ({})",
            config.spawn_delay_max, config.spawn_delay_min
        )));
    }

    if config.max_redirect_hops == Some(0) {
        return Err(ConfigError::Validation(
            "max_redirect_hops must be >= 1 when set".to_string(),
        ));
    }

    for (name, value) in &config.headers {
        validate_header(name, value)?;
    }

    for name in &config.count_response_headers {
        HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            ConfigError::Validation(format!("Invalid response header name '{}'", name))
        })?;
    }

    Ok(())
}

/// Checks that `secs` lies in `[min, MAX_INTERVAL_SECS]` and converts to a Duration
fn within_interval(secs: f64, min: f64) -> bool {
    (min..=MAX_INTERVAL_SECS).contains(&secs) && Duration::try_from_secs_f64(secs).is_ok()
}

/// Validates a single request header
fn validate_header(name: &str, value: &str) -> Result<(), ConfigError> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ConfigError::Validation(format!("Invalid request header name '{}'", name)))?;

    HeaderValue::from_str(value).map_err(|_| {
        ConfigError::Validation(format!("Invalid value for request header '{}'", name))
    })?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if !within_interval(config.timer_ui, 0.0) || config.timer_ui <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "timer_ui must be > 0 and <= {} seconds, got {}",
            MAX_INTERVAL_SECS, config.timer_ui
        )));
    }

    if config.needs_directory() && config.destination.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output destination cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Response bodies only exist for GET requests
fn validate_mode_combination(
    request: &RequestConfig,
    output: &OutputConfig,
) -> Result<(), ConfigError> {
    if output.mode == OutputMode::Save && request.request_type == RequestType::Head {
        return Err(ConfigError::Validation(
            "output mode 'save' requires request type GET".to_string(),
        ));
    }

    Ok(())
}
