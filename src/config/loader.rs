//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::LbConfig;
use crate::config::validation::{validate_config, ValidationError};

pub const ENV_ALGORITHM: &str = "LB_ALGORITHM";
pub const ENV_LOG_LEVEL: &str = "LB_LOG_LEVEL";
pub const ENV_ADMIN_ADDRESS: &str = "LB_ADMIN_ADDRESS";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, apply environment overrides, and validate a TOML config file.
pub fn load_config(path: &Path) -> Result<LbConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content, |key| std::env::var(key).ok())
}

/// Parse and validate config text. `env` resolves override variables so
/// callers (and tests) control the environment.
pub fn parse_config<F>(content: &str, env: F) -> Result<LbConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: LbConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config, env);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

pub fn apply_env_overrides<F>(config: &mut LbConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(algorithm) = env(ENV_ALGORITHM) {
        tracing::debug!(algorithm = %algorithm, "Algorithm overridden from environment");
        config.algorithm = algorithm;
    }
    if let Some(level) = env(ENV_LOG_LEVEL) {
        config.observability.log_level = level;
    }
    if let Some(address) = env(ENV_ADMIN_ADDRESS) {
        config.admin.bind_address = address;
    }
}
