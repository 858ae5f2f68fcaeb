//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check that the core invocation can see its config directory
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DaemonConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::DaemonConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_config(config: &DaemonConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.control.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "control.bind_address",
            format!("'{}' is not a socket address", config.control.bind_address),
        ));
    }
    if config.control.request_timeout_secs == 0 {
        errors.push(ValidationError::new("control.request_timeout_secs", "must be > 0"));
    }
    if config.control.event_buffer == 0 {
        errors.push(ValidationError::new("control.event_buffer", "must be > 0"));
    }

    if config.core.binary.as_os_str().is_empty() {
        errors.push(ValidationError::new("core.binary", "must not be empty"));
    }
    if !config.core.args.iter().any(|arg| arg.contains("{dir}")) {
        errors.push(ValidationError::new(
            "core.args",
            "must contain a {dir} placeholder for the config directory",
        ));
    }

    if config.resolver.fetch_timeout_secs == 0 {
        errors.push(ValidationError::new("resolver.fetch_timeout_secs", "must be > 0"));
    }

    if config.supervisor.stop_timeout_secs == 0 {
        errors.push(ValidationError::new("supervisor.stop_timeout_secs", "must be > 0"));
    }

    if config.readiness.enabled {
        if config.readiness.timeout_secs == 0 {
            errors.push(ValidationError::new("readiness.timeout_secs", "must be > 0"));
        }
        if config.readiness.base_interval_ms == 0
            || config.readiness.base_interval_ms > config.readiness.max_interval_ms
        {
            errors.push(ValidationError::new(
                "readiness.base_interval_ms",
                "must be > 0 and <= readiness.max_interval_ms",
            ));
        }
        if !config.readiness.path.starts_with('/') {
            errors.push(ValidationError::new("readiness.path", "must start with '/'"));
        }
    }

    if config.system_proxy.enabled {
        if config.system_proxy.host.trim().is_empty() {
            errors.push(ValidationError::new("system_proxy.host", "must not be empty"));
        }
        if config.system_proxy.bypass.iter().any(|p| p.trim().is_empty()) {
            errors.push(ValidationError::new(
                "system_proxy.bypass",
                "entries must not be blank",
            ));
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "is not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&DaemonConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = DaemonConfig::default();
        config.core.args = vec!["-f".into(), "config.yaml".into()];
        config.supervisor.stop_timeout_secs = 0;
        config.system_proxy.bypass.push("  ".into());

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["core.args", "supervisor.stop_timeout_secs", "system_proxy.bypass"]
        );
    }

    #[test]
    fn test_readiness_checks_skipped_when_disabled() {
        let mut config = DaemonConfig::default();
        config.readiness.enabled = false;
        config.readiness.timeout_secs = 0;
        assert!(validate_config(&config).is_ok());
    }
}
