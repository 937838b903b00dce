//! Configuration validation rules.

use super::schema::Config;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.logging.level.to_ascii_lowercase().as_str()) {
        errors.push(format!(
            "logging.level must be one of {}",
            LOG_LEVELS.join(", ")
        ));
    }
    if !matches!(config.logging.format.to_ascii_lowercase().as_str(), "text" | "json") {
        errors.push("logging.format must be text or json".to_string());
    }
    if config.logging.dir.trim().is_empty() {
        errors.push("logging.dir must not be empty".to_string());
    }

    let limits = &config.protocol;
    if limits.max_text_len == 0 {
        errors.push("protocol.max_text_len must be > 0".to_string());
    }
    if limits.max_op_name_len == 0 {
        errors.push("protocol.max_op_name_len must be > 0".to_string());
    }
    if limits.max_from_len == 0 {
        errors.push("protocol.max_from_len must be > 0".to_string());
    }

    if config.bus.drain_idle_iterations == 0 {
        errors.push("bus.drain_idle_iterations must be > 0".to_string());
    }

    if config.heartbeat.enabled && config.heartbeat.interval_s == 0 {
        errors.push("heartbeat.interval_s must be > 0 when heartbeat is enabled".to_string());
    }

    for (i, sender) in config.channels.console.allow_from.iter().enumerate() {
        if sender.trim().is_empty() {
            errors.push(format!("channels.console.allow_from[{}] must not be empty", i));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}
