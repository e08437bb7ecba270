//! Authorization server configuration.
//!
//! All durations use humantime notation (`"5m"`, `"12h"`) when loaded from
//! TOML or JSON.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::GrantType;

/// Root configuration of the authorization engine.
///
/// # Example (TOML)
///
/// ```toml
/// issuer = "https://auth.example.com"
/// response_types = ["code"]
/// authorization_code_lifetime = "5m"
/// legacy_claims = false
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthServerConfig {
    /// Server identifier written to the `iss` claim.
    pub issuer: String,

    /// Response types accepted at the authorize endpoint.
    /// Supported: "code", "token"
    pub response_types: Vec<String>,

    /// Lifetime of issued authorization codes.
    #[serde(with = "humantime_serde")]
    pub authorization_code_lifetime: Duration,

    /// Install the legacy claims enhancer (flattened user fields).
    pub legacy_claims: bool,

    /// Grant types whose tokens may carry a refresh token.
    pub refresh_grant_types: Vec<GrantType>,
}

impl Default for AuthServerConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080/auth".to_string(),
            response_types: vec!["code".to_string(), "token".to_string()],
            authorization_code_lifetime: Duration::from_secs(300), // 5 minutes
            legacy_claims: true,
            refresh_grant_types: vec![
                GrantType::AuthorizationCode,
                GrantType::Implicit,
                GrantType::RefreshToken,
                GrantType::Password,
            ],
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthServerConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the document cannot be parsed
    /// or fails validation.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(input).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid or inconsistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::Missing("issuer".to_string()));
        }

        if self.response_types.is_empty() {
            return Err(ConfigError::Missing("response_types".to_string()));
        }

        for response_type in &self.response_types {
            match response_type.as_str() {
                "code" | "token" => {}
                other => {
                    return Err(ConfigError::InvalidValue(format!(
                        "Invalid response type: '{}'. Must be code or token",
                        other
                    )));
                }
            }
        }

        if self.authorization_code_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "authorization_code_lifetime must be greater than zero".to_string(),
            ));
        }

        for grant in &self.refresh_grant_types {
            if matches!(
                grant,
                GrantType::ClientCredentials | GrantType::SwitchUser | GrantType::SwitchTenant
            ) {
                return Err(ConfigError::InvalidValue(format!(
                    "Grant type '{}' cannot carry refresh tokens",
                    grant
                )));
            }
        }

        Ok(())
    }

    /// Returns `true` if the response type is supported (case-insensitive).
    #[must_use]
    pub fn supports_response_type(&self, response_type: &str) -> bool {
        self.response_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(response_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AuthServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.authorization_code_lifetime, Duration::from_secs(300));
        assert!(config.supports_response_type("CODE"));
    }

    #[test]
    fn test_from_toml() {
        let config = AuthServerConfig::from_toml_str(
            r#"
            issuer = "https://auth.example.com"
            response_types = ["code"]
            authorization_code_lifetime = "2m"
            refresh_grant_types = ["authorization_code", "refresh_token"]
            "#,
        )
        .unwrap();

        assert_eq!(config.issuer, "https://auth.example.com");
        assert_eq!(config.authorization_code_lifetime, Duration::from_secs(120));
        assert!(!config.supports_response_type("token"));
        assert!(config.legacy_claims);
        assert_eq!(config.refresh_grant_types.len(), 2);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let config = AuthServerConfig {
            issuer: " ".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Missing(_))));

        let config = AuthServerConfig {
            response_types: vec!["id_token".to_string()],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));

        let config = AuthServerConfig {
            authorization_code_lifetime: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AuthServerConfig {
            refresh_grant_types: vec![GrantType::ClientCredentials],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_grant_type_fails_to_parse() {
        let result = AuthServerConfig::from_toml_str(r#"refresh_grant_types = ["magic"]"#);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = AuthServerConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AuthServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.issuer, config.issuer);
        assert_eq!(
            parsed.authorization_code_lifetime,
            config.authorization_code_lifetime
        );
    }
}
