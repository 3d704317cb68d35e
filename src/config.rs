//! Configuration loading and management.
//!
//! Loads configuration from embedded config.toml with environment variable overrides.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;

/// Embedded configuration file content.
const CONFIG_TOML: &str = include_str!("../config.toml");

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub provider: ProviderConfig,
    pub tags: TagsConfig,
    pub postgres: PostgresConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Name or path of the provider CLI binary.
    pub binary: String,
    /// Timeout for non-interactive invocations, in seconds.
    pub timeout_seconds: u64,
    /// Resource audience for `account get-access-token`.
    pub token_audience: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagsConfig {
    /// Resource group tag keys subject to steward expansion.
    pub steward_keys: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostgresConfig {
    pub port: u16,
    pub default_database: String,
    pub sslmode: String,
    /// Key Vault secret name holding the admin password.
    pub password_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    /// Load configuration from embedded config.toml with environment variable overrides.
    pub fn load() -> Result<Self> {
        let mut config: Config =
            toml::from_str(CONFIG_TOML).context("Failed to parse embedded config.toml")?;

        if let Ok(binary) = env::var("AZINSPECT_AZ_BINARY") {
            config.provider.binary = binary;
        }

        if let Ok(audience) = env::var("AZINSPECT_TOKEN_AUDIENCE") {
            config.provider.token_audience = audience;
        }

        if let Ok(secret) = env::var("AZINSPECT_PASSWORD_SECRET") {
            config.postgres.password_secret = secret;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            config.logging.level = log_level;
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate that required configuration is present.
    fn validate(&self) -> Result<()> {
        if self.provider.binary.trim().is_empty() {
            anyhow::bail!("provider.binary must not be empty");
        }

        if self.provider.timeout_seconds == 0 {
            anyhow::bail!("provider.timeout_seconds must be at least 1");
        }

        if self.provider.token_audience.trim().is_empty() {
            anyhow::bail!(
                "provider.token_audience not configured. Set AZINSPECT_TOKEN_AUDIENCE \
                 or update config.toml"
            );
        }

        if self.tags.steward_keys.is_empty() {
            anyhow::bail!("tags.steward_keys must name at least one tag key");
        }

        if self.postgres.port == 0 {
            anyhow::bail!("postgres.port must be a valid TCP port");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parsing() {
        let result = toml::from_str::<Config>(CONFIG_TOML);
        assert!(result.is_ok(), "Config parsing failed: {:?}", result.err());
    }

    #[test]
    fn test_embedded_defaults_validate() {
        let config: Config = toml::from_str(CONFIG_TOML).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.provider.binary, "az");
        assert_eq!(config.postgres.port, 5432);
        assert!(config
            .tags
            .steward_keys
            .contains(&"business_steward".to_string()));
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let mut config: Config = toml::from_str(CONFIG_TOML).unwrap();
        config.provider.timeout_seconds = 0;
        assert!(config.validate().is_err());
    }
}
