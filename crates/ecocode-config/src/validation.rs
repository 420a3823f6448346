// SPDX-FileCopyrightText: 2026 Ecocode Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation.
//!
//! Collects every problem instead of stopping at the first one.

use crate::diagnostic::ConfigError;
use crate::model::EcocodeConfig;

/// Longest allowed delay between two status checks.
pub const MAX_INTERVAL_MS: u64 = 60_000;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validates semantic constraints serde cannot express.
pub fn validate_config(config: &EcocodeConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let base_url = config.backend.base_url.trim();
    if base_url.is_empty() {
        errors.push(ConfigError::validation("backend.base_url must not be empty"));
    } else if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        errors.push(ConfigError::validation(format!(
            "backend.base_url `{base_url}` must start with http:// or https://"
        )));
    }

    if config.backend.auth_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "backend.auth_timeout_secs must be at least 1",
        ));
    }

    if config.polling.max_attempts == 0 {
        errors.push(ConfigError::validation(
            "polling.max_attempts must be at least 1",
        ));
    }

    if config.polling.interval_ms > MAX_INTERVAL_MS {
        errors.push(ConfigError::validation(format!(
            "polling.interval_ms must be at most {MAX_INTERVAL_MS}, got {}",
            config.polling.interval_ms
        )));
    }

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("gateway.host must not be empty"));
    } else {
        let is_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_hostname = host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
        if !is_ip && !is_hostname {
            errors.push(ConfigError::validation(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            )));
        }
    }

    let cookie = &config.gateway.session_cookie;
    if cookie.is_empty()
        || !cookie
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        errors.push(ConfigError::validation(format!(
            "gateway.session_cookie `{cookie}` must be a non-empty name of letters, digits, `_` or `-`"
        )));
    }

    if config.gateway.session_idle_secs == 0 {
        errors.push(ConfigError::validation(
            "gateway.session_idle_secs must be at least 1",
        ));
    }

    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "logging.level `{}` must be one of: {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
