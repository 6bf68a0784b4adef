//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (weights, thresholds, timeouts, ports)
//! - Detect duplicate server ids
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LbConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::LbConfig;
use crate::load_balancer::Algorithm;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown algorithm '{0}'")]
    UnknownAlgorithm(String),

    #[error("no servers configured")]
    NoServers,

    #[error("server id must not be empty")]
    EmptyServerId,

    #[error("duplicate server id '{0}'")]
    DuplicateServerId(String),

    #[error("server '{0}': host must not be empty")]
    EmptyHost(String),

    #[error("server '{0}': port must not be 0")]
    ZeroPort(String),

    #[error("server '{0}': weight must be at least 1")]
    ZeroWeight(String),

    #[error("health_check.{0} must be at least 1")]
    ZeroThreshold(&'static str),

    #[error("health_check.{0} must be greater than 0")]
    ZeroDuration(&'static str),

    #[error("health_check.tcp_port must not be 0")]
    ZeroTcpPort,

    #[error("health_check: at least one of tcp_check or http_check must be enabled")]
    NoProbeStage,

    #[error("health_check.expected_status_codes must not be empty")]
    NoExpectedStatus,

    #[error("health_check: invalid status code {0}")]
    InvalidStatusCode(u16),

    #[error("selection.{0} must be at least 1")]
    ZeroWindow(&'static str),

    #[error("selection.{0} must be a positive number")]
    InvalidSelectionValue(&'static str),

    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },
}

pub fn validate_config(config: &LbConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.algorithm.parse::<Algorithm>().is_err() {
        errors.push(ValidationError::UnknownAlgorithm(config.algorithm.clone()));
    }

    validate_servers(config, &mut errors);
    validate_health_check(config, &mut errors);
    validate_selection(config, &mut errors);

    if config.observability.metrics_enabled {
        check_address("observability.metrics_address", &config.observability.metrics_address, &mut errors);
    }
    if config.admin.enabled {
        check_address("admin.bind_address", &config.admin.bind_address, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_servers(config: &LbConfig, errors: &mut Vec<ValidationError>) {
    if config.servers.is_empty() {
        errors.push(ValidationError::NoServers);
    }

    let mut seen = HashSet::new();
    for server in &config.servers {
        if server.id.trim().is_empty() {
            errors.push(ValidationError::EmptyServerId);
        } else if !seen.insert(server.id.as_str()) {
            errors.push(ValidationError::DuplicateServerId(server.id.clone()));
        }
        if server.host.trim().is_empty() {
            errors.push(ValidationError::EmptyHost(server.id.clone()));
        }
        if server.port == 0 {
            errors.push(ValidationError::ZeroPort(server.id.clone()));
        }
        if server.weight == 0 {
            errors.push(ValidationError::ZeroWeight(server.id.clone()));
        }
    }
}

fn validate_health_check(config: &LbConfig, errors: &mut Vec<ValidationError>) {
    let hc = &config.health_check;

    if hc.success_threshold == 0 {
        errors.push(ValidationError::ZeroThreshold("success_threshold"));
    }
    if hc.failure_threshold == 0 {
        errors.push(ValidationError::ZeroThreshold("failure_threshold"));
    }
    if hc.interval_ms() == 0 {
        errors.push(ValidationError::ZeroDuration("interval"));
    }
    if hc.timeout_ms() == 0 {
        errors.push(ValidationError::ZeroDuration("timeout"));
    }
    if hc.enabled && !hc.tcp_check && !hc.http_check {
        errors.push(ValidationError::NoProbeStage);
    }
    if hc.tcp_port == Some(0) {
        errors.push(ValidationError::ZeroTcpPort);
    }
    if hc.http_check {
        if hc.expected_status_codes.is_empty() {
            errors.push(ValidationError::NoExpectedStatus);
        }
        for code in &hc.expected_status_codes {
            if !(100..=599).contains(code) {
                errors.push(ValidationError::InvalidStatusCode(*code));
            }
        }
    }
}

fn validate_selection(config: &LbConfig, errors: &mut Vec<ValidationError>) {
    let sel = &config.selection;

    if sel.response_window_capacity == 0 {
        errors.push(ValidationError::ZeroWindow("response_window_capacity"));
    }
    if sel.average_window == 0 {
        errors.push(ValidationError::ZeroWindow("average_window"));
    }
    if sel.evaluate_every == 0 {
        errors.push(ValidationError::ZeroWindow("evaluate_every"));
    }
    let positive = [
        ("unknown_latency_ms", sel.unknown_latency_ms),
        ("cv_threshold", sel.cv_threshold),
        ("connection_skew_ratio", sel.connection_skew_ratio),
    ];
    for (field, value) in positive {
        if !value.is_finite() || value <= 0.0 {
            errors.push(ValidationError::InvalidSelectionValue(field));
        }
    }
}

fn check_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ServerConfig;

    fn server(id: &str, port: u16, weight: u32) -> ServerConfig {
        ServerConfig {
            id: id.to_string(),
            host: "localhost".to_string(),
            port,
            weight,
            health_check_path: None,
        }
    }

    fn valid() -> LbConfig {
        LbConfig {
            servers: vec![server("a", 5001, 1), server("b", 5002, 2)],
            ..LbConfig::default()
        }
    }

    #[test]
    fn default_with_servers_is_valid() {
        assert_eq!(validate_config(&valid()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = valid();
        config.algorithm = "fastest".into();
        config.servers.push(server("a", 0, 0));
        config.health_check.failure_threshold = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::UnknownAlgorithm("fastest".into())));
        assert!(errors.contains(&ValidationError::DuplicateServerId("a".into())));
        assert!(errors.contains(&ValidationError::ZeroPort("a".into())));
        assert!(errors.contains(&ValidationError::ZeroWeight("a".into())));
        assert!(errors.contains(&ValidationError::ZeroThreshold("failure_threshold")));
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn requires_servers() {
        let config = LbConfig::default();
        assert_eq!(validate_config(&config), Err(vec![ValidationError::NoServers]));
    }

    #[test]
    fn requires_a_probe_stage() {
        let mut config = valid();
        config.health_check.tcp_check = false;
        config.health_check.http_check = false;
        assert_eq!(validate_config(&config), Err(vec![ValidationError::NoProbeStage]));

        config.health_check.enabled = false;
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn rejects_bad_status_codes_and_addresses() {
        let mut config = valid();
        config.health_check.expected_status_codes = vec![200, 700];
        config.admin.bind_address = "not-an-address".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidStatusCode(700),
                ValidationError::InvalidAddress {
                    field: "admin.bind_address",
                    value: "not-an-address".into()
                },
            ]
        );
    }

    #[test]
    fn millisecond_overrides_count_as_durations() {
        let mut config = valid();
        config.health_check.interval_secs = 0;
        config.health_check.interval_ms = Some(50);
        assert_eq!(validate_config(&config), Ok(()));
    }
}
