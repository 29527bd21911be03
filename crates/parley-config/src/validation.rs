// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation.
//!
//! Collects every violation instead of stopping at the first one.

use crate::diagnostic::ConfigError;
use crate::model::{Environment, ParleyConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const REDIS_SCHEMES: &[&str] = &["redis://", "rediss://", "unix://"];

pub fn validate_config(config: &ParleyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.server.port == 0 {
        errors.push(ConfigError::validation("server.port must be non-zero"));
    }

    if config.server.host.trim().is_empty() {
        errors.push(ConfigError::validation("server.host must not be empty"));
    }

    if !LOG_LEVELS.contains(&config.server.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "server.log_level `{}` must be one of {}",
            config.server.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if config.events.queue_capacity == 0 {
        errors.push(ConfigError::validation(
            "events.queue_capacity must be at least 1",
        ));
    }

    if config.events.emit_timeout_ms == 0 {
        errors.push(ConfigError::validation(
            "events.emit_timeout_ms must be at least 1",
        ));
    }

    if config.events.enabled
        && !REDIS_SCHEMES
            .iter()
            .any(|scheme| config.events.redis_url.starts_with(scheme))
    {
        errors.push(ConfigError::validation(format!(
            "events.redis_url `{}` must start with one of {}",
            config.events.redis_url,
            REDIS_SCHEMES.join(", ")
        )));
    }

    let token_missing = config
        .auth
        .bearer_token
        .as_deref()
        .is_none_or(|t| t.trim().is_empty());
    if config.server.environment == Environment::Production && token_missing {
        errors.push(ConfigError::validation(
            "auth.bearer_token must be set when server.environment is production",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
